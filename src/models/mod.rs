use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::BotError;

/// OHLC candlestick for one granularity interval (mid prices)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// False while the bar is still forming
    pub complete: bool,
}

/// Candle interval, named the way the broker names them
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::M1 => "M1",
            Granularity::M5 => "M5",
            Granularity::M15 => "M15",
            Granularity::M30 => "M30",
            Granularity::H1 => "H1",
            Granularity::H4 => "H4",
            Granularity::D => "D",
        }
    }

    /// Length of one bar
    pub fn duration(&self) -> Duration {
        let minutes = match self {
            Granularity::M1 => 1,
            Granularity::M5 => 5,
            Granularity::M15 => 15,
            Granularity::M30 => 30,
            Granularity::H1 => 60,
            Granularity::H4 => 240,
            Granularity::D => 1440,
        };
        Duration::from_secs(minutes * 60)
    }

    /// Next bar close strictly after `now`, aligned to the UTC epoch
    ///
    /// M15 bars close at XX:00, XX:15, XX:30 and XX:45. H4 and D bars close
    /// on UTC midnight boundaries, which holds because candles are requested
    /// with a UTC daily alignment.
    pub fn next_close_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.duration().as_secs() as i64;
        let secs = now.timestamp();
        let next = (secs.div_euclid(step) + 1) * step;
        DateTime::from_timestamp(next, 0).unwrap_or(now)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M1" => Ok(Granularity::M1),
            "M5" => Ok(Granularity::M5),
            "M15" => Ok(Granularity::M15),
            "M30" => Ok(Granularity::M30),
            "H1" => Ok(Granularity::H1),
            "H4" => Ok(Granularity::H4),
            "D" => Ok(Granularity::D),
            other => Err(BotError::config(format!("unsupported granularity: {}", other))),
        }
    }
}

impl TryFrom<String> for Granularity {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(g: Granularity) -> Self {
        g.as_str().to_string()
    }
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    None,
    Buy,
    Sell,
}

impl Signal {
    /// Side to trade, if this signal calls for a trade at all
    pub fn side(&self) -> Option<TradeSide> {
        match self {
            Signal::Buy => Some(TradeSide::Buy),
            Signal::Sell => Some(TradeSide::Sell),
            Signal::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// +1 for buys, -1 for sells
    pub fn sign(&self) -> i64 {
        match self {
            TradeSide::Buy => 1,
            TradeSide::Sell => -1,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("BUY"),
            TradeSide::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Market,
}

/// Account snapshot, read fresh whenever a trade is being sized
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub balance: Decimal,
    pub currency: Option<String>,
}

/// Bracket order: market entry with stop-loss and take-profit attached
///
/// `units` is signed, positive for buys and negative for sells. Every order
/// gets a fresh `id`; a resubmission is a new `Order` with a new id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub instrument: String,
    pub side: TradeSide,
    pub units: i64,
    pub order_type: OrderType,
    /// Price the bracket levels were computed from
    pub entry_price: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Broker acknowledgement of an accepted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderAck {
    pub order_id: Uuid,
    pub broker_transaction_id: Option<String>,
    pub fill_price: Option<Decimal>,
}

impl OrderAck {
    /// Accepted without fill details
    pub fn unconfirmed(order_id: Uuid) -> Self {
        Self {
            order_id,
            broker_transaction_id: None,
            fill_price: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_granularity_parse_and_display() {
        let g: Granularity = "m15".parse().unwrap();
        assert_eq!(g, Granularity::M15);
        assert_eq!(g.to_string(), "M15");
        assert_eq!(g.duration(), Duration::from_secs(900));
        assert!("W".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_next_close_after_aligns_to_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 10, 7, 30).unwrap();
        let next = Granularity::M15.next_close_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap());

        // Exactly on a boundary moves to the following one
        let on_boundary = Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap();
        let next = Granularity::M15.next_close_after(on_boundary);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_next_close_after_daily_and_h4_use_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 21, 30, 0).unwrap();

        let next = Granularity::D.next_close_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap());

        let next = Granularity::H4.next_close_after(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap());

        let morning = Utc.with_ymd_and_hms(2024, 3, 5, 5, 0, 0).unwrap();
        let next = Granularity::H4.next_close_after(morning);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_signal_side() {
        assert_eq!(Signal::Buy.side(), Some(TradeSide::Buy));
        assert_eq!(Signal::Sell.side(), Some(TradeSide::Sell));
        assert_eq!(Signal::None.side(), None);
        assert_eq!(TradeSide::Sell.sign(), -1);
    }
}
