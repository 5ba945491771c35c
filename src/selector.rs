// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector matching utilities for store list calls.
//!
//! [`ResourceStore`](crate::store::ResourceStore) list operations accept the same
//! equality-based selector strings the Kubernetes API server does
//! (`key=value,key!=value,key,!key`). [`KubeStore`](crate::store::KubeStore) forwards the
//! string to the API server; [`MemoryStore`](crate::store::MemoryStore) evaluates it here.
//!
//! # Example
//!
//! ```rust
//! use shadow_operator::selector::LabelQuery;
//! use std::collections::BTreeMap;
//!
//! let query = LabelQuery::parse("mesh.megaease.com/shadow-service=true");
//! let labels = BTreeMap::from([(
//!     "mesh.megaease.com/shadow-service".to_string(),
//!     "true".to_string(),
//! )]);
//! assert!(query.matches(Some(&labels)));
//! ```

use std::collections::BTreeMap;

/// One clause of a selector string.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

impl Requirement {
    fn parse(clause: &str) -> Option<Self> {
        let clause = clause.trim();
        if clause.is_empty() {
            return None;
        }
        if let Some((key, value)) = clause.split_once("!=") {
            return Some(Requirement::NotEquals(key.trim().into(), value.trim().into()));
        }
        if let Some((key, value)) = clause
            .split_once("==")
            .or_else(|| clause.split_once('='))
        {
            return Some(Requirement::Equals(key.trim().into(), value.trim().into()));
        }
        match clause.strip_prefix('!') {
            Some(key) => Some(Requirement::NotExists(key.trim().into())),
            None => Some(Requirement::Exists(clause.into())),
        }
    }

    fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        let get = |key: &str| labels.and_then(|l| l.get(key));
        match self {
            Requirement::Equals(key, value) => get(key) == Some(value),
            // Kubernetes semantics: a missing key satisfies `!=`.
            Requirement::NotEquals(key, value) => get(key) != Some(value),
            Requirement::Exists(key) => get(key).is_some(),
            Requirement::NotExists(key) => get(key).is_none(),
        }
    }
}

/// A parsed, equality-based label selector. The empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelQuery {
    requirements: Vec<Requirement>,
}

impl LabelQuery {
    /// Parse a comma-separated selector string. Empty clauses are ignored.
    #[must_use]
    pub fn parse(selector: &str) -> Self {
        Self {
            requirements: selector.split(',').filter_map(Requirement::parse).collect(),
        }
    }

    /// Whether an object carrying `labels` is selected.
    #[must_use]
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.requirements.iter().all(|req| req.matches(labels))
    }

    /// Whether this query has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
