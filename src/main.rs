use anyhow::Context;
use fxcross::api::{Broker, OandaClient, PaperOrderSink};
use fxcross::execution::ExecutionLoop;
use fxcross::BotConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    // Configuration problems are fatal before any cycle runs
    let config = BotConfig::load().context("failed to load configuration")?;

    tracing::info!(
        "🚀 [BOT ACTIVE] OANDA {:?} | {} {} | EMA{}/EMA{} crossover{}",
        config.environment,
        config.instrument,
        config.granularity,
        config.fast_window,
        config.slow_window,
        if config.paper_trading { " | PAPER" } else { "" }
    );
    tracing::info!("📊 Configuration:");
    tracing::info!("  Account: {}", config.account_id);
    tracing::info!(
        "  Stop Loss: {} pips | Take Profit: {} pips",
        config.stop_loss_pips,
        config.take_profit_pips
    );
    tracing::info!("  Risk per trade: {}%", config.risk_fraction * rust_decimal::Decimal::ONE_HUNDRED);
    tracing::info!(
        "  Poll every {}s, cool down {}s after errors",
        config.poll_interval_secs,
        config.cooling_secs
    );

    let client = Arc::new(
        OandaClient::with_base_url(
            config.api_key.clone(),
            config.base_url(),
            config.price_precision,
        )
        .context("failed to create OANDA client")?,
    );

    let mut broker = Broker::from_client(client);
    if config.paper_trading {
        broker = broker.with_order_sink(Arc::new(PaperOrderSink::new()));
    }

    let strategy = config.strategy().context("invalid strategy settings")?;
    let mut engine = ExecutionLoop::new(
        config.loop_settings(),
        Box::new(strategy),
        config.risk_parameters(),
        config.bracket_spec(),
        broker,
    );

    tracing::info!("Press Ctrl+C to stop...");

    engine
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        })
        .await;

    tracing::info!("👋 Bot stopped");
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fxcross=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
