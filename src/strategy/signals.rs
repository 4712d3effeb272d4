use crate::error::{BotError, Result};
use crate::indicators::IndicatorPoint;
use crate::models::{Candle, Signal};

/// Classify the transition between two consecutive (fast, slow) pairs
///
/// Buy when fast goes from strictly below slow to strictly above it, Sell for
/// the mirror case. Ties on either bar and absent values give `Signal::None`.
pub fn classify_crossover(
    prev_fast: Option<f64>,
    prev_slow: Option<f64>,
    last_fast: Option<f64>,
    last_slow: Option<f64>,
) -> Signal {
    let (Some(prev_fast), Some(prev_slow), Some(last_fast), Some(last_slow)) =
        (prev_fast, prev_slow, last_fast, last_slow)
    else {
        return Signal::None;
    };

    if prev_fast < prev_slow && last_fast > last_slow {
        Signal::Buy
    } else if prev_fast > prev_slow && last_fast < last_slow {
        Signal::Sell
    } else {
        Signal::None
    }
}

/// Crossover classification over two aligned indicator points
pub fn detect_crossover(prev: &IndicatorPoint, last: &IndicatorPoint) -> Signal {
    classify_crossover(prev.fast, prev.slow, last.fast, last.slow)
}

/// Validate that candle timestamps strictly increase
///
/// FX markets close on weekends, so gaps are expected; only duplicates and
/// out-of-order bars are rejected.
pub fn validate_candle_order(candles: &[Candle]) -> Result<()> {
    for pair in candles.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(BotError::InvalidMarketData(format!(
                "candle at {} does not follow {}",
                pair[1].timestamp, pair[0].timestamp
            )));
        }
    }
    Ok(())
}
