//! Retry policy shared by pipeline steps and database writes
//!
//! A step is retried only while its error is transient, with exponential
//! backoff between attempts. SQLite lock contention uses the same loop with
//! a short backoff sized to the `db_max_lock_wait_ms` setting.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::services::{SpeechError, StorageError};

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for SpeechError {
    fn is_transient(&self) -> bool {
        SpeechError::is_transient(self)
    }
}

impl Retryable for StorageError {
    fn is_transient(&self) -> bool {
        StorageError::is_transient(self)
    }
}

impl Retryable for inkf_common::Error {
    fn is_transient(&self) -> bool {
        match self {
            inkf_common::Error::Io(_) => true,
            inkf_common::Error::Database(e) => {
                self.is_database_locked()
                    || matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Policy for SQLite lock contention: 10 ms doubling to 1 s, with as
    /// many retries as it takes for the summed backoff to reach `max_wait`
    pub fn for_lock_wait(max_wait: Duration) -> Self {
        let mut policy = Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(1),
        };

        let mut waited = Duration::ZERO;
        while waited < max_wait {
            policy.max_retries += 1;
            waited += policy.backoff(policy.max_retries);
        }
        policy
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    pub async fn run<T, E, F, Fut>(&self, step: &str, job_id: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(job_id, step, attempt, "Step succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        job_id,
                        step,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(job_id, step, attempt, error = %e, "Step failed");
                    return Err(e);
                }
            }
        }
    }
}
