// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The shadow reconciliation engine.
//!
//! Every resync interval the driver runs one [`run_pass`] over all `ShadowService`
//! objects. A pass is built from these parts:
//!
//! ## Create path
//!
//! - [`search`] - find the single source workload serving a `ShadowService`'s service
//! - [`clone_shadow`] - upsert the shadow's ConfigMaps, Secrets and workload
//!
//! ## Removal path
//!
//! - [`find_deletable`] - stream orphaned shadow workloads from every namespace
//! - [`delete`] - remove one shadow workload and the objects it owns
//!
//! ## Shared state
//!
//! - [`CanaryRegistrar`] - keeps the shadow `ServiceCanary` selector in step with the set
//!   of active shadow services
//!
//! # Example
//!
//! ```rust,no_run
//! use shadow_operator::config::OperatorConfig;
//! use shadow_operator::context::Context;
//! use shadow_operator::reconcilers::run_pass;
//! use shadow_operator::store::MemoryStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn reconcile_once() -> anyhow::Result<()> {
//!     let ctx = Arc::new(Context::new(
//!         Arc::new(MemoryStore::new()),
//!         OperatorConfig::default(),
//!     ));
//!     let report = run_pass(ctx, CancellationToken::new()).await?;
//!     println!("cloned {} shadow workloads", report.cloned);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod canary;
pub mod cloner;
pub mod deleter;
pub mod resources;
pub mod retry;
pub mod searcher;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use batch::{run_pass, CloneJob, PassReport};
pub use canary::{shadow_canary_spec, CanaryRegistrar};
pub use cloner::{clone_shadow, CloneOutcome};
pub use deleter::{delete, find_deletable, DeleteReason, DeleteReport, Deletable};
pub use resources::{upsert, UpsertOutcome};
pub use searcher::search;
