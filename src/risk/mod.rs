// Risk management module
pub mod sizing;

pub use sizing::{calculate_units, RiskParameters};
