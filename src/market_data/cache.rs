use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::exchange::Candle;

const HEADER: &str = "timestamp,close";

/// Daily closes persisted as `timestamp,close` CSV (unix seconds).
#[derive(Debug, Clone)]
pub struct HistoryCache {
    path: PathBuf,
}

impl HistoryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when there is no cache file yet.
    pub fn load(&self) -> Result<Option<Vec<Candle>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        parse_csv(&raw).map(Some)
    }

    pub fn store(&self, candles: &[Candle]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut out = String::with_capacity(HEADER.len() + candles.len() * 24);
        out.push_str(HEADER);
        out.push('\n');
        for candle in candles {
            out.push_str(&format!("{},{}\n", candle.timestamp.timestamp(), candle.close));
        }
        fs::write(&self.path, out).with_context(|| format!("writing {}", self.path.display()))
    }

    pub fn invalidate(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Enough points, and the newest one is less than a day old.
pub fn is_fresh(candles: &[Candle], days: usize, now: DateTime<Utc>) -> bool {
    let Some(latest) = candles.iter().map(|c| c.timestamp).max() else {
        return false;
    };
    candles.len() >= days && now - latest < Duration::days(1)
}

fn parse_csv(raw: &str) -> Result<Vec<Candle>> {
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    match lines.next() {
        Some(header) if header.trim() == HEADER => {}
        other => return Err(anyhow!("unexpected cache header {:?}", other)),
    }

    let mut candles = lines
        .enumerate()
        .map(|(i, line)| {
            let (ts, close) = line
                .split_once(',')
                .ok_or_else(|| anyhow!("line {}: expected two columns", i + 2))?;
            let ts: i64 = ts.trim().parse().with_context(|| format!("line {}: timestamp", i + 2))?;
            let close: f64 = close.trim().parse().with_context(|| format!("line {}: close", i + 2))?;
            let timestamp = DateTime::<Utc>::from_timestamp(ts, 0)
                .ok_or_else(|| anyhow!("line {}: timestamp out of range", i + 2))?;
            Ok(Candle { timestamp, close })
        })
        .collect::<Result<Vec<_>>>()?;
    crate::exchange::types::sort_candles(&mut candles);
    Ok(candles)
}
