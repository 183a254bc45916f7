use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::signer::RequestSigner;
use super::types::{sort_candles, BuyOrder, Candle, OrderAck};
use super::{read_json, Exchange};
use crate::error::ExchangeError;
use crate::utils::config::Credentials;

pub const PUBLIC_URL: &str = "https://api-pub.bitfinex.com";
pub const AUTH_URL: &str = "https://api.bitfinex.com";

const PRICE_SYMBOL: &str = "tBTCUSD";
const ORDER_SYMBOL: &str = "tBTCUST";
const SUBMIT_PATH: &str = "/v2/auth/w/order/submit";
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct BitfinexClient {
    http: reqwest::Client,
    credentials: Credentials,
    public_url: String,
    auth_url: String,
}

impl BitfinexClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Credentials,
        public_url: Option<String>,
        auth_url: Option<String>,
    ) -> Self {
        Self {
            http,
            credentials,
            public_url: public_url.unwrap_or_else(|| PUBLIC_URL.to_string()),
            auth_url: auth_url.unwrap_or_else(|| AUTH_URL.to_string()),
        }
    }

    fn candles_url(&self, days: usize, end_ms: i64) -> String {
        let span = i64::try_from(days).unwrap_or(i64::MAX).saturating_mul(DAY_MS);
        let start_ms = end_ms.saturating_sub(span).max(0);
        format!(
            "{}/v2/candles/trade:1D:{}/hist?start={}&end={}&limit={}",
            self.public_url, PRICE_SYMBOL, start_ms, end_ms, days
        )
    }

    /// Signed `order/submit` request; the signature covers exactly the body
    /// bytes that are sent.
    fn order_request(&self, order: &BuyOrder, nonce: &str) -> Result<reqwest::Request, ExchangeError> {
        let body = order_body(order);
        let signature = RequestSigner::new(&self.credentials).bitfinex_signature(SUBMIT_PATH, nonce, &body);
        debug!("Submitting Bitfinex order {}", body);

        Ok(self
            .http
            .post(format!("{}{}", self.auth_url, SUBMIT_PATH))
            .header("Content-Type", "application/json")
            .header("bfx-nonce", nonce)
            .header("bfx-apikey", &self.credentials.api_key)
            .header("bfx-signature", signature)
            .body(body)
            .build()?)
    }
}

fn order_body(order: &BuyOrder) -> String {
    json!({
        "type": "EXCHANGE MARKET",
        "symbol": ORDER_SYMBOL,
        "amount": order.amount.to_string(),
        "meta": { "client_id": order.client_id },
    })
    .to_string()
}

#[async_trait]
impl Exchange for BitfinexClient {
    fn name(&self) -> &'static str {
        "Bitfinex"
    }

    async fn ticker_price(&self) -> Result<f64, ExchangeError> {
        let url = format!("{}/v2/ticker/{}", self.public_url, PRICE_SYMBOL);
        let response = self.http.get(&url).send().await?;
        parse_ticker(&read_json(response).await?)
    }

    async fn daily_closes(&self, days: usize) -> Result<Vec<Candle>, ExchangeError> {
        let url = self.candles_url(days, chrono::Utc::now().timestamp_millis());
        let response = self.http.get(&url).send().await?;
        parse_candles(&read_json(response).await?)
    }

    async fn market_buy(&self, order: &BuyOrder) -> Result<OrderAck, ExchangeError> {
        let nonce = chrono::Utc::now().timestamp_micros().to_string();
        let request = self.order_request(order, &nonce)?;
        let response = self.http.execute(request).await?;
        parse_order_notification(&read_json(response).await?)
    }
}

/// `[BID, BID_SIZE, ASK, ASK_SIZE, DAILY_CHANGE, DAILY_CHANGE_REL, LAST_PRICE, ...]`
pub fn parse_ticker(value: &Value) -> Result<f64, ExchangeError> {
    value
        .get(6)
        .and_then(Value::as_f64)
        .ok_or_else(|| ExchangeError::Decode(format!("ticker without last price: {}", value)))
}

/// `[[MTS, OPEN, CLOSE, HIGH, LOW, VOLUME], ...]`, newest first on the wire.
pub fn parse_candles(value: &Value) -> Result<Vec<Candle>, ExchangeError> {
    let rows = value
        .as_array()
        .ok_or_else(|| ExchangeError::Decode(format!("candles are not an array: {}", value)))?;
    if rows.is_empty() {
        return Err(ExchangeError::EmptyData("historical data"));
    }

    let mut candles = rows
        .iter()
        .map(|row| {
            let mts = row.get(0).and_then(Value::as_i64);
            let close = row.get(2).and_then(Value::as_f64);
            mts.zip(close)
                .and_then(|(mts, close)| Candle::from_millis(mts, close))
                .ok_or_else(|| ExchangeError::Decode(format!("malformed candle: {}", row)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    sort_candles(&mut candles);
    Ok(candles)
}

/// `[MTS, TYPE, MESSAGE_ID, null, ORDERS, CODE, STATUS, TEXT]`
pub fn parse_order_notification(value: &Value) -> Result<OrderAck, ExchangeError> {
    let status = value.get(6).and_then(Value::as_str).unwrap_or_default();
    if status != "SUCCESS" {
        let text = value
            .get(7)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        return Err(ExchangeError::OrderRejected(text));
    }

    // ORDERS is either a list of order arrays or a single order array
    let orders = value.get(4);
    let first = match orders.and_then(|o| o.get(0)) {
        Some(Value::Array(order)) => order.first(),
        other => other,
    };
    first
        .and_then(|id| id.as_i64().map(|id| id.to_string()).or_else(|| id.as_str().map(str::to_string)))
        .map(|id| OrderAck { id })
        .ok_or_else(|| ExchangeError::Decode(format!("order notification without id: {}", value)))
}
