use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use fng_ma_buyer::{
    exchange,
    market_data::{FearGreedClient, HistoryCache, MarketDataFeed},
    scheduler,
    trading::{Executor, StrategyRunner},
    utils::{
        config::{Config, TriggerTime},
        retry::RetryPolicy,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so LOG_LEVEL from .env / config.toml applies
    let loaded = Config::load();
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(&level);

    info!("Starting the Fear & Greed / moving average BTC buyer...");

    let config = loaded.map_err(|e| {
        error!("Error: {:#}", e);
        e
    })?;
    if config.logging.sentry_dsn.is_none() {
        warn!("SENTRY_DSN not set. Logging to console only.");
    }
    info!("{}", config.banner(chrono::Utc::now()));

    let trigger: TriggerTime = config.schedule.trigger_time.parse().map_err(|e| {
        error!("Error: {}", e);
        e
    })?;

    let exchange = exchange::connect(&config.exchange)?;
    info!("{} client initialized", exchange.name());

    let retry = RetryPolicy::new(
        config.exchange.retry_attempts,
        Duration::from_secs(config.exchange.retry_delay_secs),
    );
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.exchange.timeout_secs))
        .build()?;

    let feed = MarketDataFeed::new(
        exchange.clone(),
        HistoryCache::new(config.market_data.history_cache_path.clone()),
        retry,
    );
    let runner = Arc::new(StrategyRunner::new(
        config.strategy.clone(),
        feed,
        Executor::new(exchange, retry),
        Arc::new(FearGreedClient::new(http, config.market_data.fng_url.clone())),
    ));

    let mut scheduler = scheduler::start_daily(runner.clone(), trigger).await?;

    // Run once right away instead of waiting for the first trigger
    runner.run_trigger().await;

    scheduler::shutdown_signal().await;
    info!("Shutting down scheduler...");
    scheduler.shutdown().await?;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
