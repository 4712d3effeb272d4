// Trading strategy module
pub mod crossover;
pub mod signals;

use crate::error::Result;
use crate::models::{Candle, Signal};

pub use crossover::EmaCrossoverStrategy;
pub use signals::{classify_crossover, detect_crossover, validate_candle_order};

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal from completed candles, oldest first
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}
