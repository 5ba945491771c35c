// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Shadow Operator - shadow services for the EaseMesh service mesh
//!
//! The shadow operator mirrors production workloads into "shadow" copies that receive
//! tagged test traffic. Shadow copies point their data-store connections at shadow
//! databases, caches and queues so test traffic never touches production state.
//!
//! ## Overview
//!
//! A `ShadowService` custom resource declares the intent. On every resync pass the
//! operator:
//!
//! - finds the workload serving the declared service
//! - clones it (with its ConfigMaps and Secrets) into a `-shadow` copy, stripped of mesh
//!   sidecar scaffolding and carrying `EASE_RESOURCE_*` environment overrides
//! - registers the service with a singleton `ServiceCanary` so the mesh routes requests
//!   carrying `X-Mesh-Shadow: shadow` to the shadow instances
//! - garbage collects shadows whose `ShadowService` or source workload is gone
//!
//! ## Modules
//!
//! - [`crd`] - Custom resource types (`ShadowService`, `ServiceCanary`, `MeshDeployment`)
//! - [`workload`] - The closed set of workload kinds a shadow can mirror
//! - [`mutator`] - Pure pod template rewriting
//! - [`naming`] - Reversible shadow name derivation
//! - [`store`] - Typed cluster access (`KubeStore`, `MemoryStore`)
//! - [`reconcilers`] - Searcher, cloner, garbage collector, canary registrar, batch driver
//! - [`config`] - Command line and environment configuration
//! - [`metrics`] - Prometheus metrics
//! - [`http`] - `/metrics` and `/healthz` endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use shadow_operator::crd::{MySqlConfig, ShadowResourceConfig, ShadowService, ShadowServiceSpec};
//!
//! let shadow_service = ShadowService::new(
//!     "orders-shadow",
//!     ShadowServiceSpec {
//!         service_name: "orders-v1".to_string(),
//!         resource_config: ShadowResourceConfig {
//!             mysql: Some(MySqlConfig {
//!                 hosts: vec!["db-shadow:3306".to_string()],
//!                 ..Default::default()
//!             }),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     },
//! );
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod http;
pub mod labels;
pub mod metrics;
pub mod mutator;
pub mod naming;
pub mod reconcilers;
pub mod selector;
pub mod store;
pub mod workload;
