// Technical indicators module
// EMA pair over candle closes for the crossover strategy

pub mod moving_average;
pub mod series;

pub use moving_average::{calculate_sma, ema_series, Ema};
pub use series::{compute_indicator_series, IndicatorPoint, IndicatorSeries};
