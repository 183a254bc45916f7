use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.toml";

/// Upper bound for `MA_PERIOD_DAYS`, a little over 27 years of daily candles.
pub const MAX_MA_PERIOD_DAYS: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub strategy: StrategyConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Bitfinex,
    Coinex,
}

impl ExchangeKind {
    /// Prefix of the credential variables, e.g. `BITFINEX_API_KEY`.
    pub fn env_prefix(self) -> &'static str {
        match self {
            ExchangeKind::Bitfinex => "BITFINEX",
            ExchangeKind::Coinex => "COINEX",
        }
    }

    pub fn api_key_var(self) -> String {
        format!("{}_API_KEY", self.env_prefix())
    }

    pub fn api_secret_var(self) -> String {
        format!("{}_API_SECRET", self.env_prefix())
    }

    /// Variables that must be present before the bot starts.
    pub fn required_vars(self) -> Vec<String> {
        let mut vars = vec![
            self.api_key_var(),
            self.api_secret_var(),
            "TRIGGER_TIME".to_string(),
            "FNG_THRESHOLD_PERCENT".to_string(),
            "MA_THRESHOLD_PERCENT".to_string(),
        ];
        if self == ExchangeKind::Bitfinex {
            vars.push("BUY_DAILY_AMOUNT".to_string());
        }
        vars
    }
}

impl FromStr for ExchangeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bitfinex" => Ok(ExchangeKind::Bitfinex),
            "coinex" => Ok(ExchangeKind::Coinex),
            other => Err(ConfigError::UnknownExchange(other.to_string())),
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Bitfinex => write!(f, "Bitfinex"),
            ExchangeKind::Coinex => write!(f, "CoinEx"),
        }
    }
}

/// API key pair. The secret never shows up in `Debug` output.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Only for signing requests.
    pub fn expose_secret(&self) -> &str {
        &self.api_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub kind: ExchangeKind,
    pub credentials: Credentials,
    /// Overrides the exchange's public REST host.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Overrides the exchange's authenticated REST host.
    #[serde(default)]
    pub private_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_ma_period")]
    pub ma_period_days: usize,
    #[serde(default = "default_fng_threshold")]
    pub fng_threshold: f64,
    #[serde(default = "default_ma_threshold")]
    pub ma_threshold: f64,
    #[serde(default = "default_overlap_amount")]
    pub buy_overlap_amount: Decimal,
    #[serde(default = "default_fng_amount")]
    pub buy_fng_amount: Decimal,
    #[serde(default = "default_ma_amount")]
    pub buy_ma_amount: Decimal,
    #[serde(default)]
    pub buy_daily_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Daily UTC trigger, `HH:MM`. Parsed after the banner is printed.
    pub trigger_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "default_fng_url")]
    pub fng_url: String,
    #[serde(default = "default_cache_path")]
    pub history_cache_path: PathBuf,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            fng_url: default_fng_url(),
            history_cache_path: default_cache_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            sentry_dsn: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_ma_period() -> usize {
    730
}

fn default_fng_threshold() -> f64 {
    25.0
}

fn default_ma_threshold() -> f64 {
    0.1
}

fn default_overlap_amount() -> Decimal {
    Decimal::new(2, 4)
}

fn default_fng_amount() -> Decimal {
    Decimal::new(1, 4)
}

fn default_ma_amount() -> Decimal {
    Decimal::new(5, 4)
}

fn default_fng_url() -> String {
    "https://api.alternative.me/fng/?limit=1".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./btc_usdt_historical.csv")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Loads `.env` and `config.toml` from `dir`. The file wins when
    /// present; `LOG_LEVEL` and `SENTRY_DSN` from the environment still
    /// override its `[logging]` section.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        dotenv::from_path(dir.join(".env")).ok();
        let lookup = |key: &str| std::env::var(key).ok();

        // Try to load from config file first
        if let Ok(config_str) = fs::read_to_string(dir.join(CONFIG_FILE)) {
            return Ok(Self::from_file_str(&config_str, lookup)?);
        }

        // Fallback to environment variables
        Ok(Self::from_lookup(lookup)?)
    }

    /// Parses a `config.toml` body, then applies the logging overrides from
    /// `lookup`.
    pub fn from_file_str<F>(raw: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = toml::from_str(raw)?;
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(level) = get("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(dsn) = get("SENTRY_DSN") {
            config.logging.sentry_dsn = Some(dsn);
        }
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from a variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let kind = match get("EXCHANGE") {
            Some(raw) => raw.parse()?,
            None => ExchangeKind::Bitfinex,
        };

        let missing: Vec<String> = kind
            .required_vars()
            .into_iter()
            .filter(|var| get(var.as_str()).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let ma_period_days = parse_var(&get, "MA_PERIOD_DAYS", default_ma_period())?;
        check_ma_period(ma_period_days)?;

        let credentials = Credentials::new(
            get(kind.api_key_var().as_str()).unwrap_or_default(),
            get(kind.api_secret_var().as_str()).unwrap_or_default(),
        );

        Ok(Config {
            exchange: ExchangeConfig {
                kind,
                credentials,
                public_url: get("EXCHANGE_PUBLIC_URL"),
                private_url: get("EXCHANGE_PRIVATE_URL"),
                timeout_secs: parse_var(&get, "HTTP_TIMEOUT_SECS", default_timeout_secs())?,
                retry_attempts: parse_var(&get, "RETRY_ATTEMPTS", default_retry_attempts())?,
                retry_delay_secs: parse_var(&get, "RETRY_DELAY_SECS", default_retry_delay_secs())?,
            },
            strategy: StrategyConfig {
                ma_period_days,
                fng_threshold: parse_var(&get, "FNG_THRESHOLD_PERCENT", default_fng_threshold())?,
                ma_threshold: parse_var(&get, "MA_THRESHOLD_PERCENT", default_ma_threshold())?,
                buy_overlap_amount: parse_var(&get, "BUY_OVERLAP_AMOUNT", default_overlap_amount())?,
                buy_fng_amount: parse_var(&get, "BUY_FNG_AMOUNT", default_fng_amount())?,
                buy_ma_amount: parse_var(&get, "BUY_MA_AMOUNT", default_ma_amount())?,
                buy_daily_amount: get("BUY_DAILY_AMOUNT")
                    .map(|raw| parse_value("BUY_DAILY_AMOUNT", &raw))
                    .transpose()?,
            },
            schedule: ScheduleConfig {
                trigger_time: get("TRIGGER_TIME").unwrap_or_default(),
            },
            market_data: MarketDataConfig {
                fng_url: get("FNG_URL").unwrap_or_else(default_fng_url),
                history_cache_path: get("HISTORY_CACHE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_cache_path),
            },
            logging: LoggingConfig {
                level: get("LOG_LEVEL").unwrap_or_else(default_log_level),
                sentry_dsn: get("SENTRY_DSN"),
            },
        })
    }

    /// Applies the required-variable rules to a file-based config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = self.exchange.kind;
        let mut missing = Vec::new();
        if self.exchange.credentials.api_key.is_empty() {
            missing.push(kind.api_key_var());
        }
        if self.exchange.credentials.expose_secret().is_empty() {
            missing.push(kind.api_secret_var());
        }
        if self.schedule.trigger_time.trim().is_empty() {
            missing.push("TRIGGER_TIME".to_string());
        }
        if kind == ExchangeKind::Bitfinex && self.strategy.buy_daily_amount.is_none() {
            missing.push("BUY_DAILY_AMOUNT".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }
        check_ma_period(self.strategy.ma_period_days)
    }

    pub fn banner(&self, started_at: DateTime<Utc>) -> String {
        let set = |present: bool| if present { "Set" } else { "Not set" };
        let creds = &self.exchange.credentials;
        let kind = self.exchange.kind;
        let strategy = &self.strategy;

        let mut lines = vec![
            format!("Container started at {}", started_at.format("%Y-%m-%d %H:%M:%S UTC")),
            format!("Exchange: {}", kind),
            format!("TRIGGER_TIME: {}", self.schedule.trigger_time),
            format!("{}: {}", kind.api_key_var(), set(!creds.api_key.is_empty())),
            format!("{}: {}", kind.api_secret_var(), set(!creds.expose_secret().is_empty())),
            format!("SENTRY_DSN: {}", set(self.logging.sentry_dsn.is_some())),
            format!("Moving average period: {} days", strategy.ma_period_days),
            format!("Buy amount for overlap: {}", strategy.buy_overlap_amount),
            format!("Buy amount for FNG: {}", strategy.buy_fng_amount),
            format!("Buy amount for MA: {}", strategy.buy_ma_amount),
            format!("FNG threshold: {}", strategy.fng_threshold),
            format!("MA threshold: {}", strategy.ma_threshold),
        ];
        match strategy.buy_daily_amount {
            Some(amount) => lines.push(format!("Daily buy amount: {}", amount)),
            None if kind == ExchangeKind::Bitfinex => {
                lines.push("Daily buy amount: Not set".to_string())
            }
            None => {}
        }
        lines.join("\n")
    }
}

fn check_ma_period(days: usize) -> Result<(), ConfigError> {
    if days == 0 || days > MAX_MA_PERIOD_DAYS {
        return Err(ConfigError::Invalid {
            var: "MA_PERIOD_DAYS".to_string(),
            value: days.to_string(),
            reason: format!("must be between 1 and {}", MAX_MA_PERIOD_DAYS),
        });
    }
    Ok(())
}

fn parse_var<T, G>(get: &G, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => parse_value(var, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var: var.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Daily trigger in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTime {
    pub hour: u32,
    pub minute: u32,
}

impl TriggerTime {
    /// Six-field cron expression (sec min hour dom mon dow).
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }
}

impl FromStr for TriggerTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTriggerTime(s.to_string());
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 2 {
            return Err(invalid());
        }
        let field = |p: &str, max: u32| -> Result<u32, ConfigError> {
            if p.is_empty() || p.len() > 2 || !p.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let v: u32 = p.parse().map_err(|_| invalid())?;
            if v > max {
                return Err(invalid());
            }
            Ok(v)
        };
        Ok(TriggerTime {
            hour: field(parts[0], 23)?,
            minute: field(parts[1], 59)?,
        })
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
