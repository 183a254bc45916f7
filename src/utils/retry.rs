use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Fixed-delay retry for exchange calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            // Zero attempts would never run the operation
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds or the attempts are used up.
    ///
    /// Every failed attempt is logged as a warning; the final failure is
    /// logged as an error and returned. `what` completes the sentences
    /// "Attempt 1/3 to {what} failed" and "Failed to {what}".
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Attempt {}/{} to {} failed: {}", attempt, self.attempts, what, e);
                    if attempt >= self.attempts {
                        error!("Failed to {}: {}", what, e);
                        return Err(e);
                    }
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
