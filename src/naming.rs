// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deterministic, reversible names for shadow objects.
//!
//! A shadow workload is named `<source>-<suffix>`, where the suffix is `shadow` unless a
//! canary-suffixed naming scheme is configured. [`ShadowNaming::source_name`] is the exact
//! inverse, which is what lets the garbage collector walk back from a shadow to its source.

use crate::constants::SHADOW_NAME_SUFFIX;

/// Naming scheme for shadow workloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowNaming {
    suffix: String,
}

impl Default for ShadowNaming {
    fn default() -> Self {
        Self {
            suffix: SHADOW_NAME_SUFFIX.to_string(),
        }
    }
}

impl ShadowNaming {
    /// Naming scheme that appends `-<canary_name>` instead of `-shadow`.
    #[must_use]
    pub fn with_canary_suffix(canary_name: &str) -> Self {
        Self {
            suffix: canary_name.to_string(),
        }
    }

    /// The suffix (without the leading dash).
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Name of the shadow workload mirroring `source_name`.
    #[must_use]
    pub fn shadow_name(&self, source_name: &str) -> String {
        format!("{source_name}-{}", self.suffix)
    }

    /// Name of the source workload a shadow mirrors, or `None` when `shadow_name` does not
    /// carry this scheme's suffix.
    #[must_use]
    pub fn source_name(&self, shadow_name: &str) -> Option<String> {
        shadow_name
            .strip_suffix(self.suffix.as_str())
            .and_then(|rest| rest.strip_suffix('-'))
            .filter(|base| !base.is_empty())
            .map(str::to_string)
    }

    /// Whether `name` looks like a shadow name under this scheme.
    #[must_use]
    pub fn is_shadow_name(&self, name: &str) -> bool {
        self.source_name(name).is_some()
    }
}

/// Name of the shadow copy of a ConfigMap or Secret referenced by `volume_name`.
///
/// Also used for the rewritten volume reference inside the shadow pod template, so the two
/// always agree.
#[must_use]
pub fn shadow_volume_name(volume_name: &str, shadow_workload_name: &str) -> String {
    format!("{volume_name}-{shadow_workload_name}")
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
