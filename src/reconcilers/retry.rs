// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for resource store calls.
//!
//! Transient store errors (conflicts, deadlines, 429, 5xx) are retried on a jittered
//! exponential schedule. Permanent errors (not found, other 4xx) fail on the first attempt.

use crate::errors::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Shape of an exponential backoff schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// First delay
    pub initial: Duration,
    /// Cap on any single delay
    pub max: Duration,
    /// Give up once this much time has passed since the first attempt; `None` leaves the
    /// bound to the caller's attempt limit
    pub max_elapsed: Option<Duration>,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Each delay is spread uniformly over `delay * (1 ± jitter)`
    pub jitter: f64,
}

impl BackoffPolicy {
    /// Transient store failures: 100ms doubling up to 30s, for at most 2 minutes.
    pub const STORE: BackoffPolicy = BackoffPolicy {
        initial: Duration::from_millis(100),
        max: Duration::from_secs(30),
        max_elapsed: Some(Duration::from_secs(120)),
        multiplier: 2.0,
        jitter: 0.1,
    };

    /// Optimistic-concurrency losses: 20ms doubling up to 2s. A lost race usually clears
    /// on the next read.
    pub const CONFLICT: BackoffPolicy = BackoffPolicy {
        initial: Duration::from_millis(20),
        max: Duration::from_secs(2),
        max_elapsed: None,
        multiplier: 2.0,
        jitter: 0.1,
    };

    /// Start a schedule now.
    #[must_use]
    pub fn start(self) -> ExponentialBackoff {
        ExponentialBackoff {
            policy: self,
            next: self.initial,
            started: Instant::now(),
        }
    }
}

/// A running backoff schedule.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    next: Duration,
    started: Instant,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Un-jittered delay the next call to [`ExponentialBackoff::next_backoff`] is based on.
    #[must_use]
    pub fn current_interval(&self) -> Duration {
        self.next
    }

    /// The delay before the next attempt, or `None` once `max_elapsed` has passed.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self
            .policy
            .max_elapsed
            .is_some_and(|limit| self.started.elapsed() >= limit)
        {
            return None;
        }

        let base = self.next;
        self.next = base.mul_f64(self.policy.multiplier).min(self.policy.max);

        let spread = 1.0 + self.policy.jitter * (2.0 * rand::random::<f64>() - 1.0);
        Some(base.mul_f64(spread.max(0.0)))
    }
}

/// Backoff for retrying transient store failures.
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    BackoffPolicy::STORE.start()
}

/// Backoff for read-modify-write loops on shared objects such as the `ServiceCanary`
/// singleton. The number of attempts is bounded by the caller, not by elapsed time.
#[must_use]
pub fn conflict_backoff() -> ExponentialBackoff {
    BackoffPolicy::CONFLICT.start()
}

/// Retry a store call with exponential backoff.
///
/// Retries while [`StoreError::is_retryable`] holds, at most `max_attempts` times in total,
/// and fails immediately on permanent errors.
///
/// # Errors
///
/// Returns the last error when it is not retryable, when `max_attempts` is reached or when
/// the backoff gives up.
pub async fn retry_store_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
    mut backoff: ExponentialBackoff,
    max_attempts: u32,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let started = Instant::now();
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, elapsed = ?started.elapsed(), "Store call succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        let delay = if attempt < max_attempts {
            backoff.next_backoff()
        } else {
            None
        };
        let Some(delay) = delay else {
            error!(operation = operation_name, attempt, elapsed = ?started.elapsed(), error = %err, "Giving up on store call");
            return Err(err);
        };

        warn!(operation = operation_name, attempt, retry_after = ?delay, error = %err, "Retryable store error");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
