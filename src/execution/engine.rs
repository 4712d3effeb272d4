use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};

use super::order_builder::{build_bracket_order, BracketSpec};
use crate::api::Broker;
use crate::error::BotError;
use crate::models::{Candle, Granularity, Order, OrderAck, Signal};
use crate::risk::{calculate_units, RiskParameters};
use crate::strategy::{validate_candle_order, Strategy};

/// Scheduling and routing settings for the loop
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub account_id: String,
    pub instrument: String,
    pub granularity: Granularity,
    /// Candles requested per fetch
    pub candle_count: usize,
    /// Time between ticks
    pub poll_interval: Duration,
    /// Backoff after a transport failure
    pub cooling: Duration,
    /// Start on the next bar close instead of immediately
    pub align_to_candle_close: bool,
    /// Extra wait after a bar close so the broker has finalized it
    pub close_settle: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Evaluating,
    Sizing,
    Submitting,
    Cooling,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No crossover on the latest bar
    Waiting,
    /// Signal on a bar that already produced an order
    AlreadyActed { signal: Signal, bar: DateTime<Utc> },
    /// Contract violation inside the cycle (insufficient history, bad data, bad risk inputs)
    Skipped(String),
    /// Signal present but the balance sizes to zero units
    ZeroUnits { signal: Signal },
    OrderPlaced { order: Order, ack: OrderAck },
    OrderRejected { order: Order, reason: String },
    /// Broker unreachable; the loop cools down before the next tick
    TransientFailure(String),
}

impl CycleOutcome {
    pub fn requires_cooling(&self) -> bool {
        matches!(self, CycleOutcome::TransientFailure(_))
    }
}

/// Fetch -> evaluate -> size -> submit, one cycle per tick
///
/// Cycles never overlap. Indicators are recomputed from a fresh candle window
/// every cycle and the balance is read right before sizing. Retries happen
/// only here, and only on a later tick after the cooling delay.
pub struct ExecutionLoop {
    settings: LoopSettings,
    strategy: Box<dyn Strategy>,
    risk: RiskParameters,
    bracket: BracketSpec,
    broker: Broker,
    state: LoopState,
    last_traded_bar: Option<DateTime<Utc>>,
}

impl ExecutionLoop {
    pub fn new(
        settings: LoopSettings,
        strategy: Box<dyn Strategy>,
        risk: RiskParameters,
        bracket: BracketSpec,
        broker: Broker,
    ) -> Self {
        Self {
            settings,
            strategy,
            risk,
            bracket,
            broker,
            state: LoopState::Idle,
            last_traded_bar: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Loop state change");
            self.state = next;
        }
    }

    /// Run one full cycle and report its outcome
    ///
    /// Leaves the loop in `Cooling` after a transient failure, `Idle` otherwise.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.execute_cycle().await;
        self.report(&outcome);

        if outcome.requires_cooling() {
            self.transition(LoopState::Cooling);
        } else {
            self.transition(LoopState::Idle);
        }

        outcome
    }

    async fn execute_cycle(&mut self) -> CycleOutcome {
        self.transition(LoopState::Fetching);
        let candles = match self.fetch_completed_candles().await {
            Ok(candles) => candles,
            Err(e @ BotError::InvalidMarketData(_)) => return CycleOutcome::Skipped(e.to_string()),
            Err(e) => return CycleOutcome::TransientFailure(e.to_string()),
        };

        self.transition(LoopState::Evaluating);
        let signal = match self.strategy.generate_signal(&candles) {
            Ok(signal) => signal,
            Err(e) => return Self::failure(e),
        };

        let Some(last) = candles.last() else {
            return CycleOutcome::Waiting;
        };
        if signal == Signal::None {
            return CycleOutcome::Waiting;
        }

        tracing::info!(
            instrument = %self.settings.instrument,
            strategy = self.strategy.name(),
            bar = %last.timestamp,
            close = last.close,
            "🎯 [SIGNAL] {:?} confirmed by EMA crossover",
            signal
        );

        if self.last_traded_bar == Some(last.timestamp) {
            return CycleOutcome::AlreadyActed {
                signal,
                bar: last.timestamp,
            };
        }

        self.transition(LoopState::Sizing);
        let order = match self.size_and_build(signal, last).await {
            Ok(Some(order)) => order,
            Ok(None) => return CycleOutcome::ZeroUnits { signal },
            Err(e) => return Self::failure(e),
        };

        self.transition(LoopState::Submitting);
        match self
            .broker
            .orders
            .submit(&self.settings.account_id, &order)
            .await
        {
            Ok(ack) => {
                self.last_traded_bar = Some(last.timestamp);
                CycleOutcome::OrderPlaced { order, ack }
            }
            Err(BotError::Rejected(reason)) => {
                self.last_traded_bar = Some(last.timestamp);
                CycleOutcome::OrderRejected { order, reason }
            }
            Err(e) => Self::failure(e),
        }
    }

    /// Fresh window of completed candles, oldest first
    async fn fetch_completed_candles(&self) -> crate::Result<Vec<Candle>> {
        let mut candles = self
            .broker
            .candles
            .fetch_candles(
                &self.settings.instrument,
                self.settings.granularity,
                self.settings.candle_count,
            )
            .await?;

        let fetched = candles.len();
        candles.retain(|c| c.complete);
        if candles.len() < fetched {
            tracing::debug!(
                dropped = fetched - candles.len(),
                "Excluded in-progress candle"
            );
        }

        validate_candle_order(&candles)?;
        Ok(candles)
    }

    /// Read the balance, size the trade and build the bracket
    ///
    /// `None` when the balance is too small for a single unit.
    async fn size_and_build(&self, signal: Signal, last: &Candle) -> crate::Result<Option<Order>> {
        let account = self
            .broker
            .accounts
            .fetch_account(&self.settings.account_id)
            .await?;

        let units = calculate_units(account.balance, &self.risk)?;
        tracing::debug!(balance = %account.balance, units, "Position sized");
        if units == 0 {
            return Ok(None);
        }

        let price = Decimal::from_f64(last.close).ok_or_else(|| {
            BotError::InvalidMarketData(format!("close price {} is not representable", last.close))
        })?;

        let order = build_bracket_order(
            &self.settings.instrument,
            signal,
            price,
            units,
            &self.bracket,
        )?;
        Ok(Some(order))
    }

    fn failure(err: BotError) -> CycleOutcome {
        if err.is_transient() {
            CycleOutcome::TransientFailure(err.to_string())
        } else {
            CycleOutcome::Skipped(err.to_string())
        }
    }

    fn report(&self, outcome: &CycleOutcome) {
        let instrument = &self.settings.instrument;
        match outcome {
            CycleOutcome::Waiting => {
                tracing::info!(instrument = %instrument, "⏳ [WAIT] No valid EMA crossover yet");
            }
            CycleOutcome::AlreadyActed { signal, bar } => {
                tracing::info!(
                    instrument = %instrument,
                    bar = %bar,
                    "{:?} signal on a bar already traded, no new order",
                    signal
                );
            }
            CycleOutcome::Skipped(reason) => {
                tracing::warn!(instrument = %instrument, "Cycle skipped: {}", reason);
            }
            CycleOutcome::ZeroUnits { signal } => {
                tracing::warn!(
                    instrument = %instrument,
                    "{:?} signal sized to 0 units, balance too small to trade",
                    signal
                );
            }
            CycleOutcome::OrderPlaced { order, ack } => {
                tracing::info!(
                    instrument = %instrument,
                    order_id = %order.id,
                    transaction = ?ack.broker_transaction_id,
                    units = order.units,
                    "✅ [TRADE] {} order placed | SL={} | TP={}",
                    order.side,
                    order.stop_loss_price,
                    order.take_profit_price
                );
            }
            CycleOutcome::OrderRejected { order, reason } => {
                tracing::warn!(
                    instrument = %instrument,
                    order_id = %order.id,
                    units = order.units,
                    "❌ {} order rejected by broker: {}",
                    order.side,
                    reason
                );
            }
            CycleOutcome::TransientFailure(reason) => {
                tracing::warn!(
                    instrument = %instrument,
                    cooling_secs = self.settings.cooling.as_secs(),
                    "⚠️  [ERROR] {}",
                    reason
                );
            }
        }
    }

    /// When the first cycle should run
    fn first_tick(&self) -> Instant {
        if !self.settings.align_to_candle_close {
            return Instant::now();
        }

        let now = Utc::now();
        let close = self.settings.granularity.next_close_after(now);
        let wait = (close - now).to_std().unwrap_or_default() + self.settings.close_settle;
        tracing::info!(
            next_close = %close,
            wait_secs = wait.as_secs(),
            "Waiting for the next candle close"
        );
        Instant::now() + wait
    }

    /// Drive cycles on the tick schedule until `shutdown` resolves
    ///
    /// A transport failure cools the loop down for `cooling`; ticks that fall
    /// inside the cooling window are dropped, not replayed.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut next_tick = self.first_tick();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep_until(next_tick) => {}
            }

            let outcome = self.run_cycle().await;

            if outcome.requires_cooling() {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = sleep(self.settings.cooling) => {}
                }
                self.transition(LoopState::Idle);
            }

            next_tick = next_tick_after(next_tick, Instant::now(), self.settings.poll_interval);
        }

        self.transition(LoopState::Idle);
        tracing::info!("Execution loop stopped");
    }
}

/// First scheduled tick strictly after `now`
fn next_tick_after(previous: Instant, now: Instant, interval: Duration) -> Instant {
    let mut next = previous + interval;
    while next <= now {
        next += interval;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_failure_cools() {
        assert!(CycleOutcome::TransientFailure("down".into()).requires_cooling());
        assert!(!CycleOutcome::Waiting.requires_cooling());
        assert!(!CycleOutcome::Skipped("short".into()).requires_cooling());
        assert!(!CycleOutcome::ZeroUnits { signal: Signal::Buy }.requires_cooling());
    }

    #[test]
    fn test_next_tick_skips_missed_ticks() {
        let start = Instant::now();
        let interval = Duration::from_secs(60);

        // Cycle finished on time
        let next = next_tick_after(start, start + Duration::from_secs(5), interval);
        assert_eq!(next, start + interval);

        // Cycle plus cooling ran past two ticks
        let next = next_tick_after(start, start + Duration::from_secs(130), interval);
        assert_eq!(next, start + Duration::from_secs(180));

        // Landing exactly on a tick moves to the following one
        let next = next_tick_after(start, start + Duration::from_secs(120), interval);
        assert_eq!(next, start + Duration::from_secs(180));
    }
}
