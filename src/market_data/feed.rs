use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use super::cache::{is_fresh, HistoryCache};
use crate::error::ExchangeError;
use crate::exchange::{Candle, Exchange};
use crate::utils::retry::RetryPolicy;

/// Price and daily-close access on top of an exchange, with retries and the
/// on-disk history cache.
pub struct MarketDataFeed {
    exchange: Arc<dyn Exchange>,
    cache: HistoryCache,
    retry: RetryPolicy,
}

impl MarketDataFeed {
    pub fn new(exchange: Arc<dyn Exchange>, cache: HistoryCache, retry: RetryPolicy) -> Self {
        Self {
            exchange,
            cache,
            retry,
        }
    }

    pub async fn current_price(&self) -> Result<f64, ExchangeError> {
        let what = format!("fetch {} price", self.exchange.name());
        self.retry.run(&what, || self.exchange.ticker_price()).await
    }

    /// Daily closes for the last `days` days, served from the cache when it
    /// is fresh and long enough.
    pub async fn history(&self, days: usize) -> Result<Vec<Candle>> {
        match self.cache.load() {
            Ok(Some(cached)) if is_fresh(&cached, days, chrono::Utc::now()) => {
                info!(
                    "Using cached historical data from {} with {} points",
                    self.cache.path().display(),
                    cached.len()
                );
                return Ok(cached);
            }
            Ok(Some(cached)) => {
                info!(
                    "Cache outdated or insufficient ({} points, needed {}), fetching new data",
                    cached.len(),
                    days
                );
                if let Err(e) = self.cache.invalidate() {
                    warn!("Failed to remove stale cache: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load cache: {}", e),
        }

        let candles = self
            .retry
            .run("fetch historical data", || self.exchange.daily_closes(days))
            .await?;

        info!("Fetched {} historical data points", candles.len());
        if candles.len() < days {
            warn!("Only {} data points available, needed {}", candles.len(), days);
        }

        match self.cache.store(&candles) {
            Ok(()) => info!("Saved historical data to {}", self.cache.path().display()),
            Err(e) => warn!("Failed to save cache: {}", e),
        }

        Ok(candles)
    }
}
