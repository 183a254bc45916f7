pub mod bitfinex;
pub mod coinex;
pub mod signer;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ExchangeError;
use crate::utils::config::{ExchangeConfig, ExchangeKind};

pub use bitfinex::BitfinexClient;
pub use coinex::CoinexClient;
pub use types::{BuyOrder, Candle, OrderAck};

/// Spot exchange operations the strategy needs: BTC price, daily closes and
/// market buys.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn name(&self) -> &'static str;

    /// Last traded BTC price in USD(T).
    async fn ticker_price(&self) -> Result<f64, ExchangeError>;

    /// Up to `days` daily candles, oldest first.
    async fn daily_closes(&self, days: usize) -> Result<Vec<Candle>, ExchangeError>;

    async fn market_buy(&self, order: &BuyOrder) -> Result<OrderAck, ExchangeError>;
}

pub fn connect(config: &ExchangeConfig) -> Result<Arc<dyn Exchange>, ExchangeError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let exchange: Arc<dyn Exchange> = match config.kind {
        ExchangeKind::Bitfinex => Arc::new(BitfinexClient::new(
            http,
            config.credentials.clone(),
            config.public_url.clone(),
            config.private_url.clone(),
        )),
        ExchangeKind::Coinex => Arc::new(CoinexClient::new(
            http,
            config.credentials.clone(),
            config.public_url.clone().or_else(|| config.private_url.clone()),
        )),
    };
    Ok(exchange)
}

/// Reads a JSON body, turning non-2xx responses into `ExchangeError::Status`.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ExchangeError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ExchangeError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}
