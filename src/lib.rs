// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use crate::config::BotConfig;
pub use crate::error::{BotError, Result};
pub use crate::models::*;
pub use crate::strategy::Strategy;
