use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::error::ExchangeError;
use crate::exchange::{BuyOrder, Exchange, OrderAck};
use crate::utils::retry::RetryPolicy;

/// Places market buys, retrying transient failures.
pub struct Executor {
    exchange: Arc<dyn Exchange>,
    retry: RetryPolicy,
}

impl Executor {
    pub fn new(exchange: Arc<dyn Exchange>, retry: RetryPolicy) -> Self {
        Executor { exchange, retry }
    }

    pub async fn market_buy(&self, amount: Decimal) -> Result<OrderAck, ExchangeError> {
        // One client id for every attempt of the same purchase
        let order = BuyOrder::new(amount);
        info!(
            "Placing {} market buy for {} BTC ({})",
            self.exchange.name(),
            order.amount,
            order.client_id
        );
        let what = format!("place {} buy order", self.exchange.name());
        self.retry.run(&what, || self.exchange.market_buy(&order)).await
    }
}
