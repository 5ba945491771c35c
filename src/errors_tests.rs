// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use super::super::{ShadowError, StoreError};

    fn not_found() -> StoreError {
        StoreError::NotFound {
            kind: "Deployment".to_string(),
            namespace: "shop".to_string(),
            name: "orders-v1".to_string(),
        }
    }

    #[test]
    fn test_not_found_is_not_retryable() {
        let err = not_found();
        assert!(err.is_not_found());
        assert!(!err.is_retryable(), "404 should not be retried");
        assert_eq!(err.to_string(), "Deployment 'shop/orders-v1' not found");
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        let conflict = StoreError::Conflict {
            kind: "ServiceCanary".to_string(),
            namespace: String::new(),
            name: "shadow-service-canary".to_string(),
        };
        assert!(conflict.is_conflict());
        assert!(conflict.is_retryable());

        let timeout = StoreError::Timeout {
            operation: "list Deployment".to_string(),
            timeout_secs: 10,
        };
        assert!(timeout.is_retryable());

        for code in [0, 429, 500, 503, 599] {
            let err = StoreError::Api {
                operation: "get".to_string(),
                code,
                message: "boom".to_string(),
            };
            assert!(err.is_retryable(), "code {code} should be retryable");
        }
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for code in [400, 401, 403, 422] {
            let err = StoreError::Api {
                operation: "update".to_string(),
                code,
                message: "rejected".to_string(),
            };
            assert!(!err.is_retryable(), "code {code} should not be retryable");
        }
    }

    #[test]
    fn test_store_error_wrapping_keeps_identity() {
        let err = ShadowError::store("upsert", "ConfigMap", "shop", "orders-cfg", not_found());
        let message = err.to_string();
        assert!(message.contains("upsert ConfigMap 'shop/orders-cfg'"));
        assert_eq!(err.category(), "not_found");
    }

    #[test]
    fn test_validation_category() {
        let err = ShadowError::validation("shop/orders-shadow", "no containers");
        assert_eq!(err.category(), "validation_error");
        assert_eq!(
            err.to_string(),
            "invalid shadow service 'shop/orders-shadow': no containers"
        );
    }
}
