// Broker capabilities the execution loop calls through
// OANDA v20 REST client and a logging paper sink

pub mod oanda;
pub mod paper;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Account, Candle, Granularity, Order, OrderAck};

pub use oanda::{OandaClient, OandaEnvironment};
pub use paper::PaperOrderSink;

/// Source of OHLC history, oldest candle first
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch the most recent `count` candles, including a still-forming bar
    /// (marked `complete: false`) if the broker returns one
    async fn fetch_candles(
        &self,
        instrument: &str,
        granularity: Granularity,
        count: usize,
    ) -> Result<Vec<Candle>>;
}

/// Source of live account state
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn fetch_account(&self, account_id: &str) -> Result<Account>;
}

/// Destination for orders
///
/// Fails with `BotError::Rejected` when the broker declines the order and with
/// `BotError::Transport` when it could not be reached.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit(&self, account_id: &str, order: &Order) -> Result<OrderAck>;
}

/// The three broker capabilities the execution loop needs
#[derive(Clone)]
pub struct Broker {
    pub candles: Arc<dyn CandleSource>,
    pub accounts: Arc<dyn AccountSource>,
    pub orders: Arc<dyn OrderSink>,
}

impl Broker {
    /// Use one client for market data, account state and orders
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: CandleSource + AccountSource + OrderSink + 'static,
    {
        Self {
            candles: client.clone(),
            accounts: client.clone(),
            orders: client,
        }
    }

    /// Route orders somewhere else (e.g. the paper sink)
    pub fn with_order_sink(mut self, orders: Arc<dyn OrderSink>) -> Self {
        self.orders = orders;
        self
    }
}
