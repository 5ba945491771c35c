// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration from command-line flags and environment variables.

use crate::constants::{
    DEFAULT_CANARY_RETRIES, DEFAULT_METRICS_ADDRESS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RESYNC_INTERVAL_SECS, DEFAULT_WORKER_COUNT,
};
use crate::naming::ShadowNaming;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{flag} must be greater than zero")]
    Zero { flag: &'static str },

    #[error("--canary-suffix must be a non-empty DNS label, got '{0}'")]
    CanarySuffix(String),
}

#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(version, about = "Mirrors mesh services into shadow workloads", long_about = None)]
pub struct OperatorConfig {
    /// Seconds between reconciliation passes
    #[arg(long, env = "SHADOW_RESYNC_INTERVAL_SECS", default_value_t = DEFAULT_RESYNC_INTERVAL_SECS)]
    pub resync_interval: u64,

    /// Deadline in seconds for each resource store call
    #[arg(long, env = "SHADOW_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout: u64,

    /// Concurrent clone workers and, separately, concurrent delete workers
    #[arg(long, env = "SHADOW_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Attempts for a ServiceCanary read-modify-write before giving up
    #[arg(long, env = "SHADOW_CANARY_RETRIES", default_value_t = DEFAULT_CANARY_RETRIES)]
    pub canary_retries: u32,

    /// Bind address of the metrics and health server
    #[arg(long, env = "SHADOW_METRICS_ADDRESS", default_value = DEFAULT_METRICS_ADDRESS)]
    pub metrics_address: SocketAddr,

    /// Name shadows `<source>-<suffix>` instead of `<source>-shadow`
    #[arg(long, env = "SHADOW_CANARY_SUFFIX")]
    pub canary_suffix: Option<String>,
}

impl OperatorConfig {
    /// Check values clap cannot express as types.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero intervals, timeouts, worker counts or retries, and
    /// for a canary suffix that is not a DNS label.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resync_interval == 0 {
            return Err(ConfigError::Zero {
                flag: "--resync-interval",
            });
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Zero {
                flag: "--request-timeout",
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Zero { flag: "--workers" });
        }
        if self.canary_retries == 0 {
            return Err(ConfigError::Zero {
                flag: "--canary-retries",
            });
        }
        if let Some(suffix) = &self.canary_suffix {
            let valid = !suffix.is_empty()
                && suffix.len() <= 63
                && suffix
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && !suffix.starts_with('-')
                && !suffix.ends_with('-');
            if !valid {
                return Err(ConfigError::CanarySuffix(suffix.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Naming scheme selected by `--canary-suffix`.
    #[must_use]
    pub fn naming(&self) -> ShadowNaming {
        match &self.canary_suffix {
            Some(suffix) => ShadowNaming::with_canary_suffix(suffix),
            None => ShadowNaming::default(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            resync_interval: DEFAULT_RESYNC_INTERVAL_SECS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            workers: DEFAULT_WORKER_COUNT,
            canary_retries: DEFAULT_CANARY_RETRIES,
            metrics_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            canary_suffix: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
