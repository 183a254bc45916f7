pub mod cache;
pub mod fear_greed;
pub mod feed;

pub use cache::HistoryCache;
pub use fear_greed::{FearGreedClient, SentimentSource};
pub use feed::MarketDataFeed;
