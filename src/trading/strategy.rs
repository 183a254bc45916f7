//! Buy decision: Fear & Greed index and distance below the long moving
//! average, sized by which of the two conditions fired.

use anyhow::{anyhow, bail, Result};
use rust_decimal::Decimal;
use ta::indicators::SimpleMovingAverage;
use ta::Next;
use tracing::warn;

use crate::utils::config::StrategyConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverage {
    pub value: f64,
    /// Window actually used; shorter than requested when history is short.
    pub period: usize,
}

/// Simple moving average over the last `period` closes, shrinking the window
/// to the available history.
pub fn moving_average(closes: &[f64], period: usize) -> Result<MovingAverage> {
    if closes.is_empty() {
        bail!("Historical data is empty");
    }
    if period == 0 {
        bail!("Moving average period must be positive");
    }

    let effective = period.min(closes.len());
    if effective < period {
        warn!(
            "Adjusted MA period to {} due to insufficient data ({} points)",
            effective,
            closes.len()
        );
    }

    let mut sma = SimpleMovingAverage::new(effective).map_err(|e| anyhow!("{:?}", e))?;
    let value = closes[closes.len() - effective..]
        .iter()
        .fold(0.0, |_, &close| sma.next(close));
    if !value.is_finite() {
        bail!(
            "Moving average calculation failed: {} points available, needed {}",
            closes.len(),
            effective
        );
    }

    Ok(MovingAverage {
        value,
        period: effective,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conditions {
    pub buy_fng: bool,
    pub buy_ma: bool,
}

impl Conditions {
    pub fn evaluate(fng: Option<u32>, price: f64, ma: f64, config: &StrategyConfig) -> Self {
        Self {
            buy_fng: fng.map_or(false, |v| f64::from(v) <= config.fng_threshold),
            buy_ma: price <= (1.0 - config.ma_threshold) * ma,
        }
    }

    pub fn overlap(&self) -> bool {
        self.buy_fng && self.buy_ma
    }

    /// Overlap wins over either single condition.
    pub fn signal(&self) -> Option<Signal> {
        match (self.buy_fng, self.buy_ma) {
            (true, true) => Some(Signal::Overlap),
            (true, false) => Some(Signal::FearAndGreed),
            (false, true) => Some(Signal::BelowMovingAverage),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Overlap,
    FearAndGreed,
    BelowMovingAverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyPlan {
    pub signal: Signal,
    pub amount: Decimal,
    pub reason: String,
}

impl BuyPlan {
    /// `Err` carries the rejection reason when the configured amount is not
    /// positive.
    pub fn for_signal(signal: Signal, config: &StrategyConfig) -> Result<Self, String> {
        let fng = format_number(config.fng_threshold);
        let pct = format_number(config.ma_threshold * 100.0);
        let (amount, reason) = match signal {
            Signal::Overlap => (
                config.buy_overlap_amount,
                format!("Overlap (Fear and Greed ≤ {}, Price ≥ {}% below MA)", fng, pct),
            ),
            Signal::FearAndGreed => (config.buy_fng_amount, format!("Fear and Greed ≤ {}", fng)),
            Signal::BelowMovingAverage => (config.buy_ma_amount, format!("Price ≥ {}% below MA", pct)),
        };
        if amount <= Decimal::ZERO {
            return Err("Buy amount must be positive".to_string());
        }
        Ok(Self {
            signal,
            amount,
            reason,
        })
    }
}

/// At most six decimal places, always with a fractional part (0.1 * 100
/// prints as 10.0).
fn format_number(x: f64) -> String {
    let rounded = (x * 1e6).round() / 1e6;
    format!("{:?}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StrategyConfig {
        StrategyConfig {
            ma_period_days: 730,
            fng_threshold: 25.0,
            ma_threshold: 0.1,
            buy_overlap_amount: Decimal::new(2, 4),
            buy_fng_amount: Decimal::new(1, 4),
            buy_ma_amount: Decimal::new(5, 4),
            buy_daily_amount: None,
        }
    }

    #[test]
    fn test_moving_average_of_tail() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ma = moving_average(&closes, 3).unwrap();
        assert_eq!(ma.period, 3);
        assert!((ma.value - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_shrinks_window() {
        let closes = [10.0, 20.0, 30.0];
        let ma = moving_average(&closes, 730).unwrap();
        assert_eq!(ma.period, 3);
        assert!((ma.value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_empty_history() {
        let err = moving_average(&[], 730).unwrap_err();
        assert_eq!(err.to_string(), "Historical data is empty");
        assert!(moving_average(&[1.0], 0).is_err());
    }

    #[test]
    fn test_conditions() {
        let cfg = config();
        // 10% below an MA of 100 means price <= 90
        let c = Conditions::evaluate(Some(25), 90.0, 100.0, &cfg);
        assert!(c.buy_fng && c.buy_ma && c.overlap());
        assert_eq!(c.signal(), Some(Signal::Overlap));

        let c = Conditions::evaluate(Some(26), 90.0, 100.0, &cfg);
        assert_eq!(c.signal(), Some(Signal::BelowMovingAverage));

        let c = Conditions::evaluate(Some(10), 90.5, 100.0, &cfg);
        assert_eq!(c.signal(), Some(Signal::FearAndGreed));

        let c = Conditions::evaluate(None, 95.0, 100.0, &cfg);
        assert!(!c.buy_fng);
        assert_eq!(c.signal(), None);
    }

    #[test]
    fn test_missing_fng_never_fires() {
        let mut cfg = config();
        cfg.fng_threshold = 100.0;
        assert!(!Conditions::evaluate(None, 1.0, 100.0, &cfg).buy_fng);
    }

    #[test]
    fn test_plan_amounts_and_reasons() {
        let cfg = config();
        let plan = BuyPlan::for_signal(Signal::Overlap, &cfg).unwrap();
        assert_eq!(plan.amount, Decimal::new(2, 4));
        assert_eq!(plan.reason, "Overlap (Fear and Greed ≤ 25.0, Price ≥ 10.0% below MA)");

        let plan = BuyPlan::for_signal(Signal::FearAndGreed, &cfg).unwrap();
        assert_eq!(plan.amount, Decimal::new(1, 4));
        assert_eq!(plan.reason, "Fear and Greed ≤ 25.0");

        let plan = BuyPlan::for_signal(Signal::BelowMovingAverage, &cfg).unwrap();
        assert_eq!(plan.amount, Decimal::new(5, 4));
        assert_eq!(plan.reason, "Price ≥ 10.0% below MA");
    }

    #[test]
    fn test_plan_rejects_non_positive_amount() {
        let mut cfg = config();
        cfg.buy_ma_amount = Decimal::ZERO;
        assert!(BuyPlan::for_signal(Signal::BelowMovingAverage, &cfg).is_err());
        assert!(BuyPlan::for_signal(Signal::FearAndGreed, &cfg).is_ok());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.1 * 100.0), "10.0");
        assert_eq!(format_number(0.15 * 100.0), "15.0");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(25.0), "25.0");
    }
}
