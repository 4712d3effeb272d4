use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BotError, Result};
use crate::models::{Order, OrderType, Signal, TradeSide};

/// Stop-loss and take-profit distances attached to every entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BracketSpec {
    pub stop_loss_pips: Decimal,
    pub take_profit_pips: Decimal,
    /// Price increment of one pip (0.0001 for most USD pairs)
    pub pip_size: Decimal,
}

impl BracketSpec {
    pub fn validate(&self) -> Result<()> {
        if self.stop_loss_pips <= Decimal::ZERO || self.take_profit_pips <= Decimal::ZERO {
            return Err(BotError::risk(format!(
                "bracket distances must be positive (SL={}p, TP={}p)",
                self.stop_loss_pips, self.take_profit_pips
            )));
        }
        if self.pip_size <= Decimal::ZERO {
            return Err(BotError::risk(format!(
                "pip size must be positive, got {}",
                self.pip_size
            )));
        }
        Ok(())
    }

    pub fn stop_loss_distance(&self) -> Decimal {
        self.stop_loss_pips * self.pip_size
    }

    pub fn take_profit_distance(&self) -> Decimal {
        self.take_profit_pips * self.pip_size
    }
}

/// Build a market entry with attached stop-loss and take-profit
///
/// Buy: SL below and TP above `price`, positive units.
/// Sell: SL above and TP below `price`, negative units.
/// Only builds the value; submission belongs to the execution loop.
pub fn build_bracket_order(
    instrument: &str,
    signal: Signal,
    price: Decimal,
    units: u64,
    spec: &BracketSpec,
) -> Result<Order> {
    let side = signal.side().ok_or(BotError::InvalidSignal)?;
    spec.validate()?;

    if price <= Decimal::ZERO {
        return Err(BotError::InvalidOrder(format!(
            "entry price must be positive, got {}",
            price
        )));
    }
    if units == 0 {
        return Err(BotError::InvalidOrder("zero units".to_string()));
    }
    let magnitude = i64::try_from(units)
        .map_err(|_| BotError::InvalidOrder(format!("{} units out of range", units)))?;

    let sl_distance = spec.stop_loss_distance();
    let tp_distance = spec.take_profit_distance();
    let (stop_loss_price, take_profit_price) = match side {
        TradeSide::Buy => (price - sl_distance, price + tp_distance),
        TradeSide::Sell => (price + sl_distance, price - tp_distance),
    };

    if stop_loss_price <= Decimal::ZERO || take_profit_price <= Decimal::ZERO {
        return Err(BotError::InvalidOrder(format!(
            "bracket leaves non-positive price (SL={}, TP={})",
            stop_loss_price, take_profit_price
        )));
    }

    Ok(Order {
        id: Uuid::new_v4(),
        instrument: instrument.to_string(),
        side,
        units: magnitude * side.sign(),
        order_type: OrderType::Market,
        entry_price: price,
        stop_loss_price,
        take_profit_price,
        created_at: Utc::now(),
    })
}
