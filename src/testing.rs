//! In-memory exchange and sentiment source for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::ExchangeError;
use crate::exchange::{BuyOrder, Candle, Exchange, OrderAck};
use crate::market_data::SentimentSource;

pub struct FakeExchange {
    price: Option<f64>,
    closes: Vec<f64>,
    fail_orders: bool,
    history_calls: AtomicUsize,
    orders: Mutex<Vec<BuyOrder>>,
}

impl FakeExchange {
    /// `price: None` makes every ticker call fail; empty `closes` makes every
    /// history call fail.
    pub fn new(price: Option<f64>, closes: Vec<f64>) -> Self {
        Self {
            price,
            closes,
            fail_orders: false,
            history_calls: AtomicUsize::new(0),
            orders: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_orders(mut self) -> Self {
        self.fail_orders = true;
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// Every order attempt, failed ones included.
    pub fn orders(&self) -> Vec<BuyOrder> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn ticker_price(&self) -> Result<f64, ExchangeError> {
        self.price.ok_or(ExchangeError::EmptyData("ticker"))
    }

    async fn daily_closes(&self, days: usize) -> Result<Vec<Candle>, ExchangeError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.closes.is_empty() {
            return Err(ExchangeError::EmptyData("historical data"));
        }
        // Whole seconds, like the cache file
        let now = DateTime::<Utc>::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let n = self.closes.len();
        Ok(self
            .closes
            .iter()
            .enumerate()
            .skip(n.saturating_sub(days))
            .map(|(i, &close)| Candle {
                timestamp: now - Duration::days((n - 1 - i) as i64),
                close,
            })
            .collect())
    }

    async fn market_buy(&self, order: &BuyOrder) -> Result<OrderAck, ExchangeError> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        if self.fail_orders {
            return Err(ExchangeError::OrderRejected("insufficient balance".to_string()));
        }
        Ok(OrderAck {
            id: format!("order-{}", orders.len()),
        })
    }
}

pub struct FakeSentiment(pub Option<u32>);

#[async_trait]
impl SentimentSource for FakeSentiment {
    async fn fear_and_greed(&self) -> anyhow::Result<u32> {
        self.0.ok_or_else(|| anyhow::anyhow!("index unavailable"))
    }
}
