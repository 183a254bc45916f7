use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One daily candle; only the close is used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl Candle {
    pub fn from_millis(ms: i64, close: f64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(ms / 1000, 0).map(|timestamp| Candle { timestamp, close })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: String,
}

/// Market buy as sent to the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyOrder {
    /// BTC, rounded to 8 decimal places.
    pub amount: Decimal,
    pub client_id: String,
}

impl BuyOrder {
    pub fn new(amount: Decimal) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            amount: amount.round_dp(8).normalize(),
            client_id: format!("strategy6_{}", &id[..8]),
        }
    }
}

/// Sorts ascending by time.
pub fn sort_candles(candles: &mut [Candle]) {
    candles.sort_by_key(|c| c.timestamp);
}
