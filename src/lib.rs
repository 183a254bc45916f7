//! Daily BTC buyer driven by the Crypto Fear & Greed Index and the distance
//! below a long moving average, on Bitfinex or CoinEx.

pub mod error;
pub mod exchange;
pub mod market_data;
pub mod scheduler;
pub mod trading;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
