// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{conflict_backoff, default_backoff, retry_store_call};
    use crate::errors::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn conflict() -> StoreError {
        StoreError::Conflict {
            kind: "ServiceCanary".to_string(),
            namespace: String::new(),
            name: "shadow-service-canary".to_string(),
        }
    }

    #[test]
    fn test_store_policy() {
        let backoff = default_backoff();
        let policy = backoff.policy();

        assert_eq!(policy.initial, Duration::from_millis(100));
        assert_eq!(policy.max, Duration::from_secs(30));
        assert_eq!(policy.max_elapsed, Some(Duration::from_secs(120)));
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(policy.multiplier, 2.0);
            assert_eq!(policy.jitter, 0.1);
        }
    }

    /// Conflict retries are bounded by attempts, not time
    #[test]
    fn test_conflict_policy() {
        let backoff = conflict_backoff();

        assert_eq!(backoff.policy().initial, Duration::from_millis(20));
        assert_eq!(backoff.policy().max, Duration::from_secs(2));
        assert!(backoff.policy().max_elapsed.is_none());
    }

    #[test]
    fn test_backoff_progression_with_jitter() {
        let mut backoff = conflict_backoff();

        let first = backoff.next_backoff().expect("no elapsed cap");
        assert!(
            first >= Duration::from_millis(18) && first <= Duration::from_millis(22),
            "first interval should be ~20ms, got {first:?}"
        );
        assert_eq!(backoff.current_interval(), Duration::from_millis(40));

        for _ in 0..20 {
            backoff.next_backoff();
        }
        assert_eq!(
            backoff.current_interval(),
            Duration::from_secs(2),
            "interval should cap at max"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_backoff_gives_up_after_max_elapsed() {
        let mut backoff = default_backoff();
        assert!(backoff.next_backoff().is_some());

        tokio::time::advance(Duration::from_secs(121)).await;

        assert!(backoff.next_backoff().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_conflicts() {
        // Arrange
        let calls = AtomicU32::new(0);

        // Act
        let result = retry_store_call(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(conflict())
                } else {
                    Ok("done")
                }
            },
            "update canary",
            conflict_backoff(),
            5,
        )
        .await;

        // Assert
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), StoreError> = retry_store_call(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(conflict())
            },
            "update canary",
            conflict_backoff(),
            4,
        )
        .await;

        assert!(result.is_err_and(|e| e.is_conflict()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_fails_immediately() {
        let calls = AtomicU32::new(0);

        let result: Result<(), StoreError> = retry_store_call(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Api {
                    operation: "update".to_string(),
                    code: 422,
                    message: "invalid".to_string(),
                })
            },
            "update canary",
            conflict_backoff(),
            5,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "4xx must not be retried");
    }
}
