// Process configuration, read once at startup from the environment

use config::{Config, Environment};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::api::OandaEnvironment;
use crate::error::{BotError, Result};
use crate::execution::{BracketSpec, LoopSettings};
use crate::models::Granularity;
use crate::risk::RiskParameters;
use crate::strategy::{EmaCrossoverStrategy, Strategy};

const ENV_PREFIX: &str = "OANDA";
// OANDA caps a single candles request
const MAX_CANDLE_COUNT: usize = 5000;

/// Immutable bot configuration
///
/// Every field can be set through an `OANDA_`-prefixed variable, e.g.
/// `OANDA_API_KEY`, `OANDA_INSTRUMENT=EUR_USD`, `OANDA_RISK_FRACTION=0.01`.
#[derive(Clone, Deserialize)]
pub struct BotConfig {
    pub api_key: String,
    pub account_id: String,
    pub environment: OandaEnvironment,
    #[serde(default)]
    pub base_url: Option<String>,
    pub instrument: String,
    pub granularity: Granularity,
    pub candle_count: usize,
    pub fast_window: usize,
    pub slow_window: usize,
    pub stop_loss_pips: Decimal,
    pub take_profit_pips: Decimal,
    pub risk_fraction: Decimal,
    pub pip_size: Decimal,
    pub pip_value: Decimal,
    pub price_precision: u32,
    pub poll_interval_secs: u64,
    pub cooling_secs: u64,
    pub align_to_candle_close: bool,
    pub close_settle_secs: u64,
    pub paper_trading: bool,
}

impl BotConfig {
    /// Load from the process environment and validate
    pub fn load() -> Result<Self> {
        Self::load_from(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from a given environment source and validate
    pub fn load_from(env: Environment) -> Result<Self> {
        let config: BotConfig = Config::builder()
            .set_default("api_key", "")?
            .set_default("account_id", "")?
            .set_default("environment", "practice")?
            .set_default("instrument", "GBP_USD")?
            .set_default("granularity", "M15")?
            .set_default("candle_count", 200)?
            .set_default("fast_window", 4)?
            .set_default("slow_window", 50)?
            .set_default("stop_loss_pips", "30")?
            .set_default("take_profit_pips", "60")?
            .set_default("risk_fraction", "0.05")?
            .set_default("pip_size", "0.0001")?
            .set_default("pip_value", "0.0001")?
            .set_default("price_precision", 5)?
            .set_default("poll_interval_secs", 900)?
            .set_default("cooling_secs", 60)?
            .set_default("align_to_candle_close", true)?
            .set_default("close_settle_secs", 5)?
            .set_default("paper_trading", false)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(BotError::config("OANDA_API_KEY is not set"));
        }
        if self.account_id.trim().is_empty() {
            return Err(BotError::config("OANDA_ACCOUNT_ID is not set"));
        }
        if self.instrument.trim().is_empty() {
            return Err(BotError::config("instrument must not be empty"));
        }

        // Window ordering is checked by the strategy itself
        let strategy = EmaCrossoverStrategy::new(self.fast_window, self.slow_window)?;
        if self.candle_count <= strategy.min_candles_required() {
            return Err(BotError::config(format!(
                "candle_count ({}) must exceed the {} candles {} needs",
                self.candle_count,
                strategy.min_candles_required(),
                strategy.name()
            )));
        }
        if self.candle_count > MAX_CANDLE_COUNT {
            return Err(BotError::config(format!(
                "candle_count ({}) exceeds the broker maximum of {}",
                self.candle_count, MAX_CANDLE_COUNT
            )));
        }

        self.risk_parameters()
            .validate()
            .map_err(|e| BotError::config(e.to_string()))?;
        self.bracket_spec()
            .validate()
            .map_err(|e| BotError::config(e.to_string()))?;

        if self.poll_interval_secs == 0 {
            return Err(BotError::config("poll_interval_secs must be positive"));
        }

        Ok(())
    }

    /// Sizing uses the stop-loss distance as the amount at risk
    pub fn risk_parameters(&self) -> RiskParameters {
        RiskParameters {
            risk_fraction: self.risk_fraction,
            stop_distance_pips: self.stop_loss_pips,
            pip_value: self.pip_value,
        }
    }

    pub fn bracket_spec(&self) -> BracketSpec {
        BracketSpec {
            stop_loss_pips: self.stop_loss_pips,
            take_profit_pips: self.take_profit_pips,
            pip_size: self.pip_size,
        }
    }

    pub fn strategy(&self) -> Result<EmaCrossoverStrategy> {
        EmaCrossoverStrategy::new(self.fast_window, self.slow_window)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            account_id: self.account_id.clone(),
            instrument: self.instrument.clone(),
            granularity: self.granularity,
            candle_count: self.candle_count,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            cooling: Duration::from_secs(self.cooling_secs),
            align_to_candle_close: self.align_to_candle_close,
            close_settle: Duration::from_secs(self.close_settle_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("api_key", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("environment", &self.environment)
            .field("base_url", &self.base_url())
            .field("instrument", &self.instrument)
            .field("granularity", &self.granularity)
            .field("candle_count", &self.candle_count)
            .field("fast_window", &self.fast_window)
            .field("slow_window", &self.slow_window)
            .field("stop_loss_pips", &self.stop_loss_pips)
            .field("take_profit_pips", &self.take_profit_pips)
            .field("risk_fraction", &self.risk_fraction)
            .field("pip_size", &self.pip_size)
            .field("pip_value", &self.pip_value)
            .field("price_precision", &self.price_precision)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("cooling_secs", &self.cooling_secs)
            .field("align_to_candle_close", &self.align_to_candle_close)
            .field("close_settle_secs", &self.close_settle_secs)
            .field("paper_trading", &self.paper_trading)
            .finish()
    }
}
