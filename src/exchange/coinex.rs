use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::signer::RequestSigner;
use super::types::{sort_candles, BuyOrder, Candle, OrderAck};
use super::{read_json, Exchange};
use crate::error::ExchangeError;
use crate::utils::config::Credentials;

pub const BASE_URL: &str = "https://api.coinex.com";

const MARKET: &str = "BTCUSDT";
const ORDER_PATH: &str = "/v2/spot/order";

#[derive(Debug, Deserialize)]
struct TickerEntry {
    last: String,
}

#[derive(Debug, Deserialize)]
struct Kline {
    created_at: i64,
    close: String,
}

#[derive(Debug, Deserialize)]
struct PlacedOrder {
    order_id: Value,
}

pub struct CoinexClient {
    http: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl CoinexClient {
    pub fn new(http: reqwest::Client, credentials: Credentials, base_url: Option<String>) -> Self {
        Self {
            http,
            credentials,
            base_url: base_url.unwrap_or_else(|| BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl Exchange for CoinexClient {
    fn name(&self) -> &'static str {
        "CoinEx"
    }

    async fn ticker_price(&self) -> Result<f64, ExchangeError> {
        let url = format!("{}/v2/spot/ticker?market={}", self.base_url, MARKET);
        let response = self.http.get(&url).send().await?;
        parse_ticker(read_json(response).await?)
    }

    async fn daily_closes(&self, days: usize) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!(
            "{}/v2/spot/kline?market={}&period=1day&limit={}",
            self.base_url, MARKET, days
        );
        let response = self.http.get(&url).send().await?;
        parse_klines(read_json(response).await?)
    }

    async fn market_buy(&self, order: &BuyOrder) -> Result<OrderAck, ExchangeError> {
        let body = order_body(order);
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = RequestSigner::new(&self.credentials).coinex_signature("POST", ORDER_PATH, &body, &timestamp);
        debug!("Submitting CoinEx order {}", body);

        let response = self
            .http
            .post(format!("{}{}", self.base_url, ORDER_PATH))
            .header("Content-Type", "application/json")
            .header("X-COINEX-KEY", &self.credentials.api_key)
            .header("X-COINEX-SIGN", signature)
            .header("X-COINEX-TIMESTAMP", timestamp)
            .body(body)
            .send()
            .await?;
        parse_order(read_json(response).await?)
    }
}

fn order_body(order: &BuyOrder) -> String {
    json!({
        "market": MARKET,
        "market_type": "SPOT",
        "side": "buy",
        "type": "market",
        "amount": order.amount.to_string(),
        "ccy": "BTC",
        "client_id": order.client_id,
    })
    .to_string()
}

/// Unwraps `{"code": 0, "data": ..., "message": "OK"}`.
fn envelope<T: DeserializeOwned>(value: Value) -> Result<T, ExchangeError> {
    let code = value.get("code").and_then(Value::as_i64).ok_or_else(|| {
        ExchangeError::Decode(format!("response without code: {}", value))
    })?;
    if code != 0 {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ExchangeError::Api {
            exchange: "CoinEx",
            code,
            message,
        });
    }
    let data = value.get("data").cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(data)?)
}

pub fn parse_ticker(value: Value) -> Result<f64, ExchangeError> {
    let tickers: Vec<TickerEntry> = envelope(value)?;
    let first = tickers.first().ok_or(ExchangeError::EmptyData("ticker"))?;
    first
        .last
        .parse()
        .map_err(|_| ExchangeError::Decode(format!("invalid last price '{}'", first.last)))
}

pub fn parse_klines(value: Value) -> Result<Vec<Candle>, ExchangeError> {
    let klines: Vec<Kline> = envelope(value)?;
    if klines.is_empty() {
        return Err(ExchangeError::EmptyData("historical data"));
    }
    let mut candles = klines
        .iter()
        .map(|k| {
            k.close
                .parse::<f64>()
                .ok()
                .and_then(|close| Candle::from_millis(k.created_at, close))
                .ok_or_else(|| ExchangeError::Decode(format!("malformed kline: {:?}", k)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    sort_candles(&mut candles);
    Ok(candles)
}

pub fn parse_order(value: Value) -> Result<OrderAck, ExchangeError> {
    let placed: PlacedOrder = envelope(value)?;
    let id = match placed.order_id {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => return Err(ExchangeError::Decode(format!("unexpected order id {}", other))),
    };
    Ok(OrderAck { id })
}
