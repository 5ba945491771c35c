// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the shadow service operator.
//!
//! This module provides two layers of errors:
//! - [`StoreError`] - failures reported by a [`ResourceStore`](crate::store::ResourceStore)
//!   (not found, already exists, optimistic-concurrency conflicts, deadlines, API errors)
//! - [`ShadowError`] - failures of the core reconciliation engine, which wrap store errors
//!   with the identity of the object being processed
//!
//! Per-item errors are always returned, never panicked on. The batch driver decides to log
//! and continue.

use thiserror::Error;

/// Errors reported by a resource store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist (HTTP 404)
    ///
    /// Expected while probing for an existing object before choosing create vs update, or
    /// when a source workload has disappeared. Not logged as an error.
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Namespace of the object (empty for cluster-scoped objects)
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// Create was rejected because the object already exists (HTTP 409 `AlreadyExists`)
    #[error("{kind} '{namespace}/{name}' already exists")]
    AlreadyExists {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// Update lost an optimistic-concurrency race (HTTP 409 `Conflict`)
    ///
    /// The caller should re-read the object and retry the modification.
    #[error("{kind} '{namespace}/{name}' was modified concurrently")]
    Conflict {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// The call did not finish before its deadline
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        /// Human-readable operation, e.g. `get Deployment shop/orders-v1`
        operation: String,
        /// Deadline that was exceeded
        timeout_secs: u64,
    },

    /// Any other failure (transport, auth, validation by the API server, ...)
    #[error("{operation} failed (code {code}): {message}")]
    Api {
        /// Human-readable operation
        operation: String,
        /// HTTP status code, 0 when the failure happened before a response
        code: u16,
        /// Message from the API server or transport
        message: String,
    },
}

impl StoreError {
    /// Whether this error means the object is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether this error is an optimistic-concurrency loss.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Conflicts, deadlines, rate limiting (429) and server errors (5xx) are transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Conflict { .. } | StoreError::Timeout { .. } => true,
            StoreError::Api { code, .. } => *code == 0 || *code == 429 || (500..600).contains(code),
            StoreError::NotFound { .. } | StoreError::AlreadyExists { .. } => false,
        }
    }

    /// Short category used as a metrics label.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::AlreadyExists { .. } => "already_exists",
            StoreError::Conflict { .. } => "conflict",
            StoreError::Timeout { .. } => "timeout",
            StoreError::Api { .. } => "api_error",
        }
    }
}

/// Errors of the shadow reconciliation engine.
#[derive(Error, Debug)]
pub enum ShadowError {
    /// The inputs cannot produce a valid shadow workload
    ///
    /// Fatal for the single `ShadowService` being processed (e.g. a source workload without
    /// containers, or an app container that cannot be found). Never aborts the batch.
    #[error("invalid shadow service '{shadow_service}': {reason}")]
    Validation {
        /// `namespace/name` of the shadow service
        shadow_service: String,
        /// What is wrong
        reason: String,
    },

    /// A store call failed while processing one object
    #[error("failed to {operation} {kind} '{namespace}/{name}': {source}")]
    Store {
        /// Verb, e.g. `upsert`, `delete`, `list`
        operation: &'static str,
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// A value could not be serialized (shadow resource config or template hashing)
    #[error("failed to serialize {what}: {source}")]
    Serialization {
        /// What was being serialized
        what: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The `ServiceCanary` singleton kept changing under us
    #[error("gave up updating ServiceCanary '{name}' after {attempts} conflicting attempts")]
    CanaryConflict {
        /// Name of the canary
        name: String,
        /// Attempts made
        attempts: u32,
    },
}

impl ShadowError {
    /// Wrap a store error with the identity of the object being processed.
    #[must_use]
    pub fn store(
        operation: &'static str,
        kind: &str,
        namespace: &str,
        name: &str,
        source: StoreError,
    ) -> Self {
        ShadowError::Store {
            operation,
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        }
    }

    /// Build a validation error for one shadow service.
    #[must_use]
    pub fn validation(shadow_service: &str, reason: impl Into<String>) -> Self {
        ShadowError::Validation {
            shadow_service: shadow_service.to_string(),
            reason: reason.into(),
        }
    }

    /// Short category used as a metrics label.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            ShadowError::Validation { .. } => "validation_error",
            ShadowError::Store { source, .. } => source.category(),
            ShadowError::Serialization { .. } => "serialization_error",
            ShadowError::CanaryConflict { .. } => "conflict",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
