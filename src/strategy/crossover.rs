use super::{signals::detect_crossover, Strategy};
use crate::error::{BotError, Result};
use crate::indicators::{compute_indicator_series, IndicatorSeries};
use crate::models::{Candle, Signal};

/// Dual EMA crossover strategy
///
/// Buys when the fast EMA crosses above the slow EMA on the latest bar and
/// sells on the opposite cross. Only the last transition counts; history is
/// never scanned for an older crossover.
#[derive(Debug, Clone)]
pub struct EmaCrossoverStrategy {
    fast_window: usize,
    slow_window: usize,
}

impl EmaCrossoverStrategy {
    pub fn new(fast_window: usize, slow_window: usize) -> Result<Self> {
        if fast_window == 0 {
            return Err(BotError::config("fast EMA window must be at least 1"));
        }
        if fast_window >= slow_window {
            return Err(BotError::config(format!(
                "fast EMA window ({}) must be shorter than slow window ({})",
                fast_window, slow_window
            )));
        }

        Ok(Self {
            fast_window,
            slow_window,
        })
    }

    /// Indicator series for the given candles
    pub fn indicators(&self, candles: &[Candle]) -> Result<IndicatorSeries> {
        compute_indicator_series(candles, self.fast_window, self.slow_window)
    }
}

impl Default for EmaCrossoverStrategy {
    fn default() -> Self {
        Self {
            fast_window: 4,
            slow_window: 50,
        }
    }
}

impl Strategy for EmaCrossoverStrategy {
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal> {
        let series = self.indicators(candles)?;

        let signal = match series.last_two() {
            Some((prev, last)) => {
                let signal = detect_crossover(prev, last);
                tracing::debug!(
                    prev_fast = ?prev.fast,
                    prev_slow = ?prev.slow,
                    last_fast = ?last.fast,
                    last_slow = ?last.slow,
                    signal = ?signal,
                    "EMA crossover evaluated"
                );
                signal
            }
            None => Signal::None,
        };

        Ok(signal)
    }

    fn name(&self) -> &str {
        "EmaCrossoverStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.slow_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn create_test_candles(prices: &[f64]) -> Vec<Candle> {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| Candle {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: price,
                high: price + 0.0005,
                low: price - 0.0005,
                close: price,
                complete: true,
            })
            .collect()
    }

    #[test]
    fn test_rejects_bad_windows() {
        assert!(EmaCrossoverStrategy::new(0, 50).is_err());
        assert!(EmaCrossoverStrategy::new(50, 50).is_err());
        assert!(EmaCrossoverStrategy::new(60, 50).is_err());
        assert!(EmaCrossoverStrategy::new(4, 50).is_ok());
    }

    #[test]
    fn test_strategy_requires_sufficient_data() {
        let strategy = EmaCrossoverStrategy::default();
        let candles = create_test_candles(&[1.25; 49]);

        let result = strategy.generate_signal(&candles);
        assert!(matches!(
            result,
            Err(BotError::InsufficientHistory { required: 50, .. })
        ));
    }

    #[test]
    fn test_upward_cross_on_last_bar_is_buy() {
        let strategy = EmaCrossoverStrategy::new(2, 4).unwrap();
        // Falling then a jump on the last bar
        let candles = create_test_candles(&[1.30, 1.29, 1.28, 1.27, 1.26, 1.25, 1.35]);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::Buy);

        // One bar earlier there is no cross yet
        assert_eq!(
            strategy.generate_signal(&candles[..6]).unwrap(),
            Signal::None
        );
    }

    #[test]
    fn test_downward_cross_on_last_bar_is_sell() {
        let strategy = EmaCrossoverStrategy::new(2, 4).unwrap();
        let candles = create_test_candles(&[1.20, 1.21, 1.22, 1.23, 1.24, 1.25, 1.15]);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::Sell);
    }

    #[test]
    fn test_steady_trend_is_none() {
        let strategy = EmaCrossoverStrategy::new(2, 4).unwrap();
        let prices: Vec<f64> = (0..20).map(|i| 1.20 + i as f64 * 0.001).collect();
        let candles = create_test_candles(&prices);
        assert_eq!(strategy.generate_signal(&candles).unwrap(), Signal::None);
    }

    #[test]
    fn test_strategy_name() {
        let strategy = EmaCrossoverStrategy::default();
        assert_eq!(strategy.name(), "EmaCrossoverStrategy");
        assert_eq!(strategy.min_candles_required(), 50);
    }
}
