use chrono::{DateTime, Utc};

use super::moving_average::ema_series;
use crate::error::{BotError, Result};
use crate::models::Candle;

/// Fast and slow EMA at one bar; `None` while a window is still filling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub fast: Option<f64>,
    pub slow: Option<f64>,
}

/// Fast/slow EMA pairs aligned 1:1 with the candles they came from
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn points(&self) -> &[IndicatorPoint] {
        &self.points
    }

    /// The two most recent points as (previous, last)
    pub fn last_two(&self) -> Option<(&IndicatorPoint, &IndicatorPoint)> {
        match self.points.as_slice() {
            [.., prev, last] => Some((prev, last)),
            _ => None,
        }
    }
}

/// Compute the fast and slow EMA over the close series
///
/// Fails with `InsufficientHistory` when there are fewer candles than the
/// larger window.
pub fn compute_indicator_series(
    candles: &[Candle],
    fast_window: usize,
    slow_window: usize,
) -> Result<IndicatorSeries> {
    let required = fast_window.max(slow_window);
    if candles.len() < required {
        return Err(BotError::InsufficientHistory {
            required,
            actual: candles.len(),
        });
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let fast = ema_series(&closes, fast_window);
    let slow = ema_series(&closes, slow_window);

    let points = candles
        .iter()
        .zip(fast)
        .zip(slow)
        .map(|((candle, fast), slow)| IndicatorPoint {
            timestamp: candle.timestamp,
            fast,
            slow,
        })
        .collect();

    Ok(IndicatorSeries { points })
}
