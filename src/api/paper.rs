use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::OrderSink;
use crate::error::Result;
use crate::models::{Order, OrderAck};

/// Order sink that only logs the bracket it would have sent
///
/// Candles and balance still come from the broker; nothing is traded.
#[derive(Debug, Default)]
pub struct PaperOrderSink {
    next_id: AtomicU64,
}

impl PaperOrderSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of paper orders taken so far
    pub fn orders_placed(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderSink for PaperOrderSink {
    async fn submit(&self, account_id: &str, order: &Order) -> Result<OrderAck> {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::info!(
            account = %account_id,
            instrument = %order.instrument,
            side = %order.side,
            units = order.units,
            entry = %order.entry_price,
            stop_loss = %order.stop_loss_price,
            take_profit = %order.take_profit_price,
            "📝 [PAPER] {} order taken",
            order.side
        );

        Ok(OrderAck {
            order_id: order.id,
            broker_transaction_id: Some(format!("paper-{}", seq)),
            fill_price: Some(order.entry_price),
        })
    }
}
