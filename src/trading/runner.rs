use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::executor::Executor;
use super::strategy::{moving_average, BuyPlan, Conditions};
use crate::market_data::{MarketDataFeed, SentimentSource};
use crate::utils::config::StrategyConfig;

/// Result of one strategy run; renders as the `YYYY-MM-DD: ...` report line.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub date: NaiveDate,
    pub kind: OutcomeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeKind {
    HistoryUnavailable,
    PriceUnavailable,
    ConditionsNotMet,
    InvalidAmount,
    Bought {
        amount: Decimal,
        usdt: f64,
        reason: String,
        order_id: String,
    },
    OrderFailed {
        amount: Decimal,
        usdt: f64,
        reason: String,
    },
}

impl fmt::Display for StrategyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.date.format("%Y-%m-%d"))?;
        match &self.kind {
            OutcomeKind::HistoryUnavailable => {
                write!(f, "No purchase - Failed to fetch or process historical data")
            }
            OutcomeKind::PriceUnavailable => write!(f, "No purchase - Failed to fetch price"),
            OutcomeKind::ConditionsNotMet => write!(f, "No purchase - Conditions not met"),
            OutcomeKind::InvalidAmount => write!(f, "No purchase - Invalid buy amount"),
            OutcomeKind::Bought {
                amount,
                usdt,
                reason,
                ..
            } => write!(f, "Bought {} BTC (~{:.2} USDT) - {}", amount, usdt, reason),
            OutcomeKind::OrderFailed {
                amount,
                usdt,
                reason,
            } => write!(f, "Failed to buy {} BTC (~{:.2} USDT) - {}", amount, usdt, reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DailyPurchase {
    Skipped,
    Bought {
        amount: Decimal,
        usdt: f64,
        order_id: String,
    },
    Failed(String),
}

/// Runs the daily purchase and the conditional strategy against one
/// exchange.
pub struct StrategyRunner {
    config: StrategyConfig,
    feed: MarketDataFeed,
    executor: Executor,
    sentiment: Arc<dyn SentimentSource>,
    // Start-up run and scheduled firings must not interleave
    trigger_lock: Mutex<()>,
}

impl StrategyRunner {
    pub fn new(
        config: StrategyConfig,
        feed: MarketDataFeed,
        executor: Executor,
        sentiment: Arc<dyn SentimentSource>,
    ) -> Self {
        Self {
            config,
            feed,
            executor,
            sentiment,
            trigger_lock: Mutex::new(()),
        }
    }

    /// Daily purchase then strategy, as one trigger.
    pub async fn run_trigger(&self) -> StrategyOutcome {
        let _guard = self.trigger_lock.lock().await;
        self.daily_purchase().await;
        let outcome = self.run_strategy().await;
        info!("{}", outcome);
        outcome
    }

    /// Unconditional fixed-size buy of the configured daily amount.
    pub async fn daily_purchase(&self) -> DailyPurchase {
        let amount = match self.config.buy_daily_amount {
            Some(amount) if amount > Decimal::ZERO => amount,
            _ => {
                warn!("No daily purchase - BUY_DAILY_AMOUNT not set or invalid");
                return DailyPurchase::Skipped;
            }
        };

        let order = match self.executor.market_buy(amount).await {
            Ok(order) => order,
            Err(e) => {
                error!("Failed to make daily purchase: {}", e);
                return DailyPurchase::Failed(e.to_string());
            }
        };
        let price = match self.feed.current_price().await {
            Ok(price) => price,
            Err(e) => {
                // The order went through; only the report is incomplete
                error!("Failed to make daily purchase: {} (Order ID: {})", e, order.id);
                return DailyPurchase::Failed(e.to_string());
            }
        };

        let usdt = usdt_value(amount, price);
        info!(
            "Daily purchase: Bought {} BTC (~{:.2} USDT) (Order ID: {})",
            amount, usdt, order.id
        );
        DailyPurchase::Bought {
            amount,
            usdt,
            order_id: order.id,
        }
    }

    pub async fn run_strategy(&self) -> StrategyOutcome {
        let date = Utc::now().date_naive();
        let outcome = |kind: OutcomeKind| StrategyOutcome { date, kind };
        info!("{}: Starting buy decision computation", date);

        let fng = match self.sentiment.fear_and_greed().await {
            Ok(value) => {
                info!("{}: FNG value: {}", date, value);
                Some(value)
            }
            Err(e) => {
                warn!("{}: Failed to fetch Fear and Greed Index - {}", date, e);
                None
            }
        };

        let ma = match self.latest_moving_average().await {
            Ok(ma) => {
                info!("{}: Latest MA ({} days): {:.2}", date, ma.period, ma.value);
                ma
            }
            Err(e) => {
                error!(
                    "{}: No purchase - Failed to fetch or process historical data: {}",
                    date, e
                );
                return outcome(OutcomeKind::HistoryUnavailable);
            }
        };

        let price = match self.feed.current_price().await {
            Ok(price) => {
                info!("{}: Current BTC/USDT price: {:.2}", date, price);
                price
            }
            Err(e) => {
                error!("{}: No purchase - Failed to fetch price: {}", date, e);
                return outcome(OutcomeKind::PriceUnavailable);
            }
        };

        let conditions = Conditions::evaluate(fng, price, ma.value, &self.config);
        info!(
            "{}: Buy conditions - FNG: {}, MA: {}, Overlap: {}",
            date,
            conditions.buy_fng,
            conditions.buy_ma,
            conditions.overlap()
        );

        let Some(signal) = conditions.signal() else {
            info!("{}: No purchase - Conditions not met", date);
            return outcome(OutcomeKind::ConditionsNotMet);
        };
        let plan = match BuyPlan::for_signal(signal, &self.config) {
            Ok(plan) => plan,
            Err(e) => {
                error!("{}: No purchase - Invalid buy amount: {}", date, e);
                return outcome(OutcomeKind::InvalidAmount);
            }
        };

        let usdt = usdt_value(plan.amount, price);
        info!(
            "{}: Planning to buy {} BTC (~{:.2} USDT) - {}",
            date, plan.amount, usdt, plan.reason
        );

        match self.executor.market_buy(plan.amount).await {
            Ok(order) => {
                info!(
                    "{}: Bought {} BTC (~{:.2} USDT) - {} (Order ID: {})",
                    date, plan.amount, usdt, plan.reason, order.id
                );
                outcome(OutcomeKind::Bought {
                    amount: plan.amount,
                    usdt,
                    reason: plan.reason,
                    order_id: order.id,
                })
            }
            Err(e) => {
                error!(
                    "{}: Failed to buy {} BTC (~{:.2} USDT) - {} (Error: {})",
                    date, plan.amount, usdt, plan.reason, e
                );
                outcome(OutcomeKind::OrderFailed {
                    amount: plan.amount,
                    usdt,
                    reason: plan.reason,
                })
            }
        }
    }

    async fn latest_moving_average(&self) -> anyhow::Result<super::strategy::MovingAverage> {
        let history = self.feed.history(self.config.ma_period_days).await?;
        let closes: Vec<f64> = history.iter().map(|c| c.close).collect();
        moving_average(&closes, self.config.ma_period_days)
    }
}

fn usdt_value(amount: Decimal, price: f64) -> f64 {
    amount.to_f64().unwrap_or_default() * price
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::HistoryCache;
    use crate::testing::{FakeExchange, FakeSentiment};
    use crate::utils::retry::RetryPolicy;
    use std::time::Duration;

    fn config() -> StrategyConfig {
        StrategyConfig {
            ma_period_days: 5,
            fng_threshold: 25.0,
            ma_threshold: 0.1,
            buy_overlap_amount: Decimal::new(2, 4),
            buy_fng_amount: Decimal::new(1, 4),
            buy_ma_amount: Decimal::new(5, 4),
            buy_daily_amount: Some(Decimal::new(1, 3)),
        }
    }

    fn runner(
        config: StrategyConfig,
        exchange: Arc<FakeExchange>,
        fng: Option<u32>,
        dir: &tempfile::TempDir,
    ) -> StrategyRunner {
        let retry = RetryPolicy::new(2, Duration::ZERO);
        let feed = MarketDataFeed::new(
            exchange.clone(),
            HistoryCache::new(dir.path().join("history.csv")),
            retry,
        );
        StrategyRunner::new(
            config,
            feed,
            Executor::new(exchange, retry),
            Arc::new(FakeSentiment(fng)),
        )
    }

    #[tokio::test]
    async fn test_overlap_buys_overlap_amount() {
        let dir = tempfile::tempdir().unwrap();
        // MA = 100, price 80 is 20% below
        let exchange = Arc::new(FakeExchange::new(Some(80.0), vec![100.0; 5]));
        let outcome = runner(config(), exchange.clone(), Some(10), &dir).run_strategy().await;

        match &outcome.kind {
            OutcomeKind::Bought { amount, usdt, order_id, .. } => {
                assert_eq!(*amount, Decimal::new(2, 4));
                assert!((usdt - 0.016).abs() < 1e-9);
                assert_eq!(order_id, "order-1");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(outcome
            .to_string()
            .ends_with("Bought 0.0002 BTC (~0.02 USDT) - Overlap (Fear and Greed ≤ 25.0, Price ≥ 10.0% below MA)"));
        assert_eq!(exchange.orders()[0].amount, Decimal::new(2, 4));
    }

    #[tokio::test]
    async fn test_fng_only_when_price_near_ma() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(99.0), vec![100.0; 5]));
        let outcome = runner(config(), exchange.clone(), Some(20), &dir).run_strategy().await;
        assert!(matches!(outcome.kind, OutcomeKind::Bought { ref reason, .. } if reason == "Fear and Greed ≤ 25.0"));
        assert_eq!(exchange.orders()[0].amount, Decimal::new(1, 4));
    }

    #[tokio::test]
    async fn test_missing_fng_falls_back_to_ma() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(85.0), vec![100.0; 5]));
        let outcome = runner(config(), exchange.clone(), None, &dir).run_strategy().await;
        assert!(matches!(outcome.kind, OutcomeKind::Bought { ref reason, .. } if reason == "Price ≥ 10.0% below MA"));
        assert_eq!(exchange.orders()[0].amount, Decimal::new(5, 4));
    }

    #[tokio::test]
    async fn test_conditions_not_met_places_no_order() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(100.0), vec![100.0; 5]));
        let outcome = runner(config(), exchange.clone(), Some(60), &dir).run_strategy().await;
        assert_eq!(outcome.kind, OutcomeKind::ConditionsNotMet);
        assert!(outcome.to_string().ends_with(": No purchase - Conditions not met"));
        assert!(exchange.orders().is_empty());
    }

    #[tokio::test]
    async fn test_history_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(80.0), vec![]));
        let outcome = runner(config(), exchange.clone(), Some(10), &dir).run_strategy().await;
        assert_eq!(outcome.kind, OutcomeKind::HistoryUnavailable);
        // Retried before giving up
        assert_eq!(exchange.history_calls(), 2);
    }

    #[tokio::test]
    async fn test_price_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(None, vec![100.0; 5]));
        let outcome = runner(config(), exchange, Some(10), &dir).run_strategy().await;
        assert_eq!(outcome.kind, OutcomeKind::PriceUnavailable);
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.buy_overlap_amount = Decimal::ZERO;
        let exchange = Arc::new(FakeExchange::new(Some(80.0), vec![100.0; 5]));
        let outcome = runner(cfg, exchange.clone(), Some(10), &dir).run_strategy().await;
        assert_eq!(outcome.kind, OutcomeKind::InvalidAmount);
        assert!(exchange.orders().is_empty());
    }

    #[tokio::test]
    async fn test_order_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(80.0), vec![100.0; 5]).failing_orders());
        let outcome = runner(config(), exchange.clone(), Some(10), &dir).run_strategy().await;
        assert!(matches!(outcome.kind, OutcomeKind::OrderFailed { .. }));
        assert!(outcome.to_string().contains("Failed to buy 0.0002 BTC (~0.02 USDT)"));
        // Both attempts reuse the same client id
        let attempts = exchange.orders();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].client_id, attempts[1].client_id);
    }

    #[tokio::test]
    async fn test_second_run_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(100.0), vec![100.0; 5]));
        let runner = runner(config(), exchange.clone(), Some(60), &dir);
        runner.run_strategy().await;
        runner.run_strategy().await;
        assert_eq!(exchange.history_calls(), 1);
    }

    #[tokio::test]
    async fn test_short_history_shrinks_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.ma_period_days = 730;
        // Average of 3 closes is 100
        let exchange = Arc::new(FakeExchange::new(Some(89.0), vec![90.0, 100.0, 110.0]));
        let outcome = runner(cfg, exchange, None, &dir).run_strategy().await;
        assert!(matches!(outcome.kind, OutcomeKind::Bought { .. }));
    }

    #[tokio::test]
    async fn test_daily_purchase() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(50_000.0), vec![100.0; 5]));
        let result = runner(config(), exchange.clone(), None, &dir).daily_purchase().await;
        assert_eq!(
            result,
            DailyPurchase::Bought {
                amount: Decimal::new(1, 3),
                usdt: 50.0,
                order_id: "order-1".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_daily_purchase_skipped_without_amount() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.buy_daily_amount = None;
        let exchange = Arc::new(FakeExchange::new(Some(50_000.0), vec![100.0; 5]));
        let result = runner(cfg.clone(), exchange.clone(), None, &dir).daily_purchase().await;
        assert_eq!(result, DailyPurchase::Skipped);

        cfg.buy_daily_amount = Some(Decimal::ZERO);
        let result = runner(cfg, exchange.clone(), None, &dir).daily_purchase().await;
        assert_eq!(result, DailyPurchase::Skipped);
        assert!(exchange.orders().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_runs_daily_purchase_first() {
        let dir = tempfile::tempdir().unwrap();
        let exchange = Arc::new(FakeExchange::new(Some(80.0), vec![100.0; 5]));
        runner(config(), exchange.clone(), Some(10), &dir).run_trigger().await;
        let orders = exchange.orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].amount, Decimal::new(1, 3));
        assert_eq!(orders[1].amount, Decimal::new(2, 4));
    }
}
