use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),

    #[error("Invalid value for {var} ({value}): {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },

    #[error("TRIGGER_TIME not set or invalid (use HH:MM, e.g., 08:00): {0}")]
    InvalidTriggerTime(String),

    #[error("Unknown exchange '{0}' (expected bitfinex or coinex)")]
    UnknownExchange(String),

    #[error("Failed to read config file: {0}")]
    File(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{exchange} API error {code}: {message}")]
    Api {
        exchange: &'static str,
        code: i64,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("No {0} returned")]
    EmptyData(&'static str),

    #[error("Order submission failed: {0}")]
    OrderRejected(String),
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::Decode(e.to_string())
    }
}
