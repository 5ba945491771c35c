// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The resource store capability consumed by the reconciliation engine.
//!
//! [`ResourceStore`] is the only way the core touches the cluster: typed
//! `get`/`list`/`create`/`update`/`delete` per object kind. Two implementations ship:
//!
//! - [`KubeStore`] - backed by `kube::Api`, every call bounded by a deadline
//! - [`MemoryStore`] - in-process, with resource versions and optimistic concurrency,
//!   used by the tests and for dry runs
//!
//! `update_*` calls are conditional on the object's `resourceVersion` when it is set and
//! fail with [`StoreError::Conflict`] when it is stale.

pub mod kube;
pub mod memory;
pub mod pagination;

pub use self::kube::KubeStore;
pub use self::memory::MemoryStore;

use crate::crd::{ServiceCanary, ShadowService};
use crate::errors::StoreError;
use crate::workload::{Workload, WorkloadKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use tracing::debug;

/// Typed access to the cluster objects the shadow engine reads and writes.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    // Namespaces and declarations
    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError>;
    async fn list_shadow_services(&self) -> Result<Vec<ShadowService>, StoreError>;

    // Workloads
    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Workload>, StoreError>;
    async fn get_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Workload, StoreError>;
    async fn create_workload(&self, workload: &Workload) -> Result<Workload, StoreError>;
    async fn update_workload(&self, workload: &Workload) -> Result<Workload, StoreError>;
    async fn delete_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError>;

    // ConfigMaps
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, StoreError>;
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;
    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;
    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // Secrets
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError>;
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // ServiceCanary (cluster-scoped)
    async fn get_service_canary(&self, name: &str) -> Result<ServiceCanary, StoreError>;
    async fn create_service_canary(
        &self,
        canary: &ServiceCanary,
    ) -> Result<ServiceCanary, StoreError>;
    async fn update_service_canary(
        &self,
        canary: &ServiceCanary,
    ) -> Result<ServiceCanary, StoreError>;

    /// List workloads of every kind in `namespace`.
    ///
    /// A kind whose list answers `NotFound` is not served by the cluster (its CRD is not
    /// installed) and contributes nothing.
    async fn list_all_workloads(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Workload>, StoreError> {
        let mut workloads = Vec::new();
        for kind in WorkloadKind::ALL {
            match self.list_workloads(kind, namespace, label_selector).await {
                Ok(listed) => workloads.extend(listed),
                Err(e) if e.is_not_found() => {
                    debug!(kind = %kind, namespace = %namespace, "Kind not served, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(workloads)
    }
}
