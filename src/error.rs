use thiserror::Error;

/// Errors produced anywhere in the bot.
///
/// Contract violations (`InsufficientHistory`, `InvalidRiskParameters`,
/// `InvalidSignal`, `InvalidOrder`, `InvalidMarketData`) skip the current cycle.
/// `Transport` sends the loop into its cooling delay. `Rejected` ends the cycle.
/// `Configuration` is only raised at startup and is fatal.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("insufficient history: need {required} candles, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("invalid risk parameters: {0}")]
    InvalidRiskParameters(String),

    #[error("invalid signal: no order can be built without a buy or sell signal")]
    InvalidSignal,

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BotError {
    /// True when the failure is worth waiting out (network, broker unreachable).
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Transport(_))
    }

    pub fn risk(msg: impl Into<String>) -> Self {
        BotError::InvalidRiskParameters(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        BotError::Configuration(msg.into())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        BotError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
