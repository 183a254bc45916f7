use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Source of the Crypto Fear & Greed Index (0-100).
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn fear_and_greed(&self) -> Result<u32>;
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
}

/// alternative.me index client.
pub struct FearGreedClient {
    http: reqwest::Client,
    url: String,
}

impl FearGreedClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SentimentSource for FearGreedClient {
    async fn fear_and_greed(&self) -> Result<u32> {
        let response = self.http.get(&self.url).send().await?.error_for_status()?;
        parse_fng(&response.text().await?)
    }
}

pub fn parse_fng(body: &str) -> Result<u32> {
    let parsed: FngResponse = serde_json::from_str(body)?;
    let entry = parsed
        .data
        .first()
        .ok_or_else(|| anyhow!("Fear and Greed response has no data"))?;
    entry
        .value
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid Fear and Greed value '{}': {}", entry.value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_value() {
        let body = r#"{
            "name": "Fear and Greed Index",
            "data": [{ "value": "23", "value_classification": "Extreme Fear", "timestamp": "1700000000" }],
            "metadata": { "error": null }
        }"#;
        assert_eq!(parse_fng(body).unwrap(), 23);
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(parse_fng(r#"{"data": []}"#).is_err());
        assert!(parse_fng(r#"{"data": [{"value": "n/a"}]}"#).is_err());
        assert!(parse_fng("not json").is_err());
    }
}
