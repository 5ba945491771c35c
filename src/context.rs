// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the reconciliation engine.
//!
//! Every pass and every worker receives an `Arc<Context>` that contains:
//! - the resource store all cluster access goes through
//! - the operator configuration
//! - the shadow naming scheme
//! - the canary registrar, which carries reference counts across passes
//! - whether stale canary entries have been pruned since startup

use crate::config::OperatorConfig;
use crate::naming::ShadowNaming;
use crate::reconcilers::canary::CanaryRegistrar;
use crate::store::ResourceStore;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Shared context passed to the batch driver and its workers.
pub struct Context {
    /// Typed access to cluster objects
    pub store: Arc<dyn ResourceStore>,

    /// Flags and environment the operator was started with
    pub config: OperatorConfig,

    /// How shadow objects are named
    pub naming: ShadowNaming,

    /// Owner of the shadow `ServiceCanary`
    pub registrar: CanaryRegistrar,

    /// Set once a pass has pruned the canary of services left over from a previous run
    pub canary_pruned: AtomicBool,
}

impl Context {
    /// Build a context over `store`, deriving naming and canary retries from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, config: OperatorConfig) -> Self {
        let registrar = CanaryRegistrar::new(Arc::clone(&store), config.canary_retries);
        Self {
            naming: config.naming(),
            store,
            config,
            registrar,
            canary_pruned: AtomicBool::new(false),
        }
    }
}
