pub mod executor;
pub mod runner;
pub mod strategy;

pub use executor::Executor;
pub use runner::{DailyPurchase, OutcomeKind, StrategyOutcome, StrategyRunner};
