// Order construction and the execution loop
pub mod engine;
pub mod order_builder;

pub use engine::{CycleOutcome, ExecutionLoop, LoopSettings, LoopState};
pub use order_builder::{build_bracket_order, BracketSpec};
