/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Incremental Exponential Moving Average
///
/// Seeded with the SMA of the first `period` values, then
/// `ema = price * k + ema * (1 - k)` with `k = 2 / (period + 1)`.
/// Feeding a series value by value gives exactly what [`ema_series`] gives.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    warmup: Vec<f64>,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            warmup: Vec::with_capacity(period),
            value: None,
        }
    }

    /// Feed the next close; returns the EMA once the window has filled
    pub fn update(&mut self, price: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }

        self.value = match self.value {
            Some(prev) => Some(price * self.multiplier + prev * (1.0 - self.multiplier)),
            None => {
                self.warmup.push(price);
                if self.warmup.len() == self.period {
                    let seed = calculate_sma(&self.warmup, self.period);
                    self.warmup.clear();
                    seed
                } else {
                    None
                }
            }
        };

        self.value
    }
}

/// EMA aligned 1:1 with `prices`; `None` until the window has filled
pub fn ema_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut ema = Ema::new(period);
    prices.iter().map(|&p| ema.update(p)).collect()
}
