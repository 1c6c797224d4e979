//! Bounded retry with linear backoff around one external stage call.
//!
//! Auth failures propagate immediately. Every other failure waits
//! `base_delay * attempt` and tries again until `max_attempts` is reached.

use crate::defaults;
use crate::pipeline::error::{FailureKind, StageError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Suspends the current task between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that records requested waits and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wait requested so far, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Sum of all requested waits.
    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

/// Attempt bound and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(defaults::RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Wraps a fallible external call with the retry policy.
#[derive(Clone)]
pub struct RetryingInvoker {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Sets a custom sleeper (for deterministic testing).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `op` until it succeeds, fails with an auth error, or exhausts the bound.
    ///
    /// `index` is only used for log context.
    pub async fn invoke<T, F, Fut>(&self, index: usize, mut op: F) -> Result<T, StageError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StageError>> + Send,
    {
        let max = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(index, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            match err.kind() {
                FailureKind::Auth => {
                    error!(index, error = %err, "authentication failed, check the API key");
                    return Err(err);
                }
                _ if attempt >= max => {
                    error!(index, attempts = max, error = %err, "giving up");
                    return Err(err);
                }
                kind => {
                    let wait = self.policy.delay_for(attempt);
                    warn!(
                        index,
                        attempt,
                        max,
                        wait_ms = wait.as_millis() as u64,
                        rate_limited = kind == FailureKind::RateLimit,
                        error = %err,
                        "retrying"
                    );
                    self.sleeper.sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
