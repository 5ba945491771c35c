// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`ResourceStore`].
//!
//! Objects live in maps behind a mutex. Every successful write bumps a store-wide resource
//! version, updates carrying a stale `resourceVersion` fail with
//! [`StoreError::Conflict`] and duplicate creates fail with [`StoreError::AlreadyExists`],
//! so the engine sees the same concurrency behavior it sees against a real API server.
//!
//! Besides the trait, the store exposes synchronous seeding and inspection helpers plus
//! fault injection ([`MemoryStore::fail_writes`], [`MemoryStore::conflict_canary_updates`],
//! [`MemoryStore::unserve_kind`])
//! for exercising the engine's error paths.

use super::ResourceStore;
use crate::constants::{
    KIND_CONFIG_MAP, KIND_DEPLOYMENT, KIND_MESH_DEPLOYMENT, KIND_SECRET, KIND_SERVICE_CANARY,
    KIND_SHADOW_SERVICE,
};
use crate::crd::{MeshDeployment, ServiceCanary, ShadowService};
use crate::errors::StoreError;
use crate::selector::LabelQuery;
use crate::workload::{Workload, WorkloadKind};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::Resource;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type ObjectKey = (String, String);

/// Objects of one kind keyed by `(namespace, name)`.
struct Table<T> {
    kind: &'static str,
    items: BTreeMap<ObjectKey, T>,
}

impl<T: Resource + Clone> Table<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: BTreeMap::new(),
        }
    }

    fn key_of(object: &T) -> ObjectKey {
        let meta = object.meta();
        (
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }

    fn not_found(&self, (namespace, name): ObjectKey) -> StoreError {
        StoreError::NotFound {
            kind: self.kind.to_string(),
            namespace,
            name,
        }
    }

    fn get(&self, namespace: &str, name: &str) -> Result<T, StoreError> {
        let key = (namespace.to_string(), name.to_string());
        match self.items.get(&key) {
            Some(object) => Ok(object.clone()),
            None => Err(self.not_found(key)),
        }
    }

    fn list(&self, namespace: Option<&str>, query: &LabelQuery) -> Vec<T> {
        self.items
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|wanted| wanted == ns))
            .filter(|(_, object)| query.matches(object.meta().labels.as_ref()))
            .map(|(_, object)| object.clone())
            .collect()
    }

    fn create(&mut self, object: &T, version: u64) -> Result<T, StoreError> {
        let key = Self::key_of(object);
        if self.items.contains_key(&key) {
            let (namespace, name) = key;
            return Err(StoreError::AlreadyExists {
                kind: self.kind.to_string(),
                namespace,
                name,
            });
        }
        let mut stored = object.clone();
        let meta = stored.meta_mut();
        meta.resource_version = Some(version.to_string());
        meta.uid.get_or_insert_with(|| format!("uid-{version}"));
        self.items.insert(key, stored.clone());
        Ok(stored)
    }

    fn update(&mut self, object: &T, version: u64) -> Result<T, StoreError> {
        let key = Self::key_of(object);
        let Some(current) = self.items.get(&key) else {
            return Err(self.not_found(key));
        };
        let current_meta = current.meta();
        if let Some(expected) = object.meta().resource_version.as_ref() {
            if current_meta.resource_version.as_ref() != Some(expected) {
                let (namespace, name) = key;
                return Err(StoreError::Conflict {
                    kind: self.kind.to_string(),
                    namespace,
                    name,
                });
            }
        }
        let uid = current_meta.uid.clone();
        let mut stored = object.clone();
        let meta = stored.meta_mut();
        meta.resource_version = Some(version.to_string());
        meta.uid = uid;
        self.items.insert(key, stored.clone());
        Ok(stored)
    }

    fn delete(&mut self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = (namespace.to_string(), name.to_string());
        match self.items.remove(&key) {
            Some(_) => Ok(()),
            None => Err(self.not_found(key)),
        }
    }

    fn namespaces(&self) -> impl Iterator<Item = &String> {
        self.items.keys().map(|(namespace, _)| namespace)
    }
}

struct State {
    version: u64,
    writes: u64,
    namespaces: BTreeSet<String>,
    shadow_services: Table<ShadowService>,
    deployments: Table<Deployment>,
    mesh_deployments: Table<MeshDeployment>,
    config_maps: Table<ConfigMap>,
    secrets: Table<Secret>,
    canaries: Table<ServiceCanary>,
    failing_writes: BTreeSet<(String, String, String)>,
    unserved_kinds: BTreeSet<WorkloadKind>,
    pending_canary_conflicts: u32,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: 0,
            writes: 0,
            namespaces: BTreeSet::new(),
            shadow_services: Table::new(KIND_SHADOW_SERVICE),
            deployments: Table::new(KIND_DEPLOYMENT),
            mesh_deployments: Table::new(KIND_MESH_DEPLOYMENT),
            config_maps: Table::new(KIND_CONFIG_MAP),
            secrets: Table::new(KIND_SECRET),
            canaries: Table::new(KIND_SERVICE_CANARY),
            failing_writes: BTreeSet::new(),
            unserved_kinds: BTreeSet::new(),
            pending_canary_conflicts: 0,
        }
    }
}

impl State {
    /// Reserve the next resource version, or fail if writes to this object are poisoned.
    fn begin_write(
        &mut self,
        verb: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<u64, StoreError> {
        let id = (kind.to_string(), namespace.to_string(), name.to_string());
        if self.failing_writes.contains(&id) {
            return Err(StoreError::Api {
                operation: format!("{verb} {kind} {namespace}/{name}"),
                code: 500,
                message: "injected failure".to_string(),
            });
        }
        self.version += 1;
        Ok(self.version)
    }

    fn finish_write<T>(&mut self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if result.is_ok() {
            self.writes += 1;
        }
        result
    }
}

/// In-memory resource store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn object_id<T: Resource>(object: &T) -> (String, String) {
    let meta = object.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a namespace that holds no objects yet.
    pub fn add_namespace(&self, namespace: &str) {
        self.state().namespaces.insert(namespace.to_string());
    }

    /// Make every create, update and delete of the named object fail with an API error.
    pub fn fail_writes(&self, kind: &str, namespace: &str, name: &str) {
        self.state().failing_writes.insert((
            kind.to_string(),
            namespace.to_string(),
            name.to_string(),
        ));
    }

    /// Answer lists of `kind` with `NotFound`, as an API server without its CRD does.
    pub fn unserve_kind(&self, kind: WorkloadKind) {
        self.state().unserved_kinds.insert(kind);
    }

    /// Make the next `count` `ServiceCanary` updates fail with a conflict.
    pub fn conflict_canary_updates(&self, count: u32) {
        self.state().pending_canary_conflicts = count;
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.state().writes
    }

    /// Seed a `ShadowService`, replacing any object with the same name.
    pub fn put_shadow_service(&self, shadow_service: ShadowService) {
        let mut state = self.state();
        state.version += 1;
        let version = state.version;
        let mut stored = shadow_service;
        stored.meta_mut().resource_version = Some(version.to_string());
        state
            .shadow_services
            .items
            .insert(object_id(&stored), stored);
    }

    /// Remove a `ShadowService`, as if a user deleted it.
    pub fn remove_shadow_service(&self, namespace: &str, name: &str) {
        let _ = self.state().shadow_services.delete(namespace, name);
    }

    /// Seed a workload, ConfigMap or Secret through the regular create path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the object is already present.
    pub fn seed_workload(&self, workload: Workload) -> Result<Workload, StoreError> {
        let mut state = self.state();
        state.version += 1;
        let version = state.version;
        match workload {
            Workload::Deployment(d) => state.deployments.create(&d, version).map(Into::into),
            Workload::MeshDeployment(m) => {
                state.mesh_deployments.create(&m, version).map(Into::into)
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the ConfigMap is already present.
    pub fn seed_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap, StoreError> {
        let mut state = self.state();
        state.version += 1;
        let version = state.version;
        state.config_maps.create(&config_map, version)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the Secret is already present.
    pub fn seed_secret(&self, secret: Secret) -> Result<Secret, StoreError> {
        let mut state = self.state();
        state.version += 1;
        let version = state.version;
        state.secrets.create(&secret, version)
    }

    /// Remove a workload, as if a user deleted it.
    pub fn remove_workload(&self, kind: WorkloadKind, namespace: &str, name: &str) {
        let mut state = self.state();
        let _ = match kind {
            WorkloadKind::Deployment => state.deployments.delete(namespace, name),
            WorkloadKind::MeshDeployment => state.mesh_deployments.delete(namespace, name),
        };
    }

    #[must_use]
    pub fn workload(&self, kind: WorkloadKind, namespace: &str, name: &str) -> Option<Workload> {
        let state = self.state();
        match kind {
            WorkloadKind::Deployment => state.deployments.get(namespace, name).ok().map(Into::into),
            WorkloadKind::MeshDeployment => state
                .mesh_deployments
                .get(namespace, name)
                .ok()
                .map(Into::into),
        }
    }

    #[must_use]
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.state().config_maps.get(namespace, name).ok()
    }

    #[must_use]
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state().secrets.get(namespace, name).ok()
    }

    #[must_use]
    pub fn service_canary(&self, name: &str) -> Option<ServiceCanary> {
        self.state().canaries.get("", name).ok()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state();
        let mut namespaces = state.namespaces.clone();
        namespaces.extend(state.shadow_services.namespaces().cloned());
        namespaces.extend(state.deployments.namespaces().cloned());
        namespaces.extend(state.mesh_deployments.namespaces().cloned());
        namespaces.extend(state.config_maps.namespaces().cloned());
        namespaces.extend(state.secrets.namespaces().cloned());
        Ok(namespaces.into_iter().collect())
    }

    async fn list_shadow_services(&self) -> Result<Vec<ShadowService>, StoreError> {
        Ok(self
            .state()
            .shadow_services
            .list(None, &LabelQuery::default()))
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Workload>, StoreError> {
        let query = label_selector.map(LabelQuery::parse).unwrap_or_default();
        let state = self.state();
        if state.unserved_kinds.contains(&kind) {
            return Err(StoreError::NotFound {
                kind: kind.as_str().to_string(),
                namespace: namespace.to_string(),
                name: "*".to_string(),
            });
        }
        Ok(match kind {
            WorkloadKind::Deployment => state
                .deployments
                .list(Some(namespace), &query)
                .into_iter()
                .map(Workload::from)
                .collect(),
            WorkloadKind::MeshDeployment => state
                .mesh_deployments
                .list(Some(namespace), &query)
                .into_iter()
                .map(Workload::from)
                .collect(),
        })
    }

    async fn get_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Workload, StoreError> {
        let state = self.state();
        match kind {
            WorkloadKind::Deployment => state.deployments.get(namespace, name).map(Into::into),
            WorkloadKind::MeshDeployment => {
                state.mesh_deployments.get(namespace, name).map(Into::into)
            }
        }
    }

    async fn create_workload(&self, workload: &Workload) -> Result<Workload, StoreError> {
        let mut state = self.state();
        let version = state.begin_write(
            "create",
            workload.kind().as_str(),
            &workload.namespace(),
            &workload.name(),
        )?;
        let result = match workload {
            Workload::Deployment(d) => state.deployments.create(d, version).map(Into::into),
            Workload::MeshDeployment(m) => {
                state.mesh_deployments.create(m, version).map(Into::into)
            }
        };
        state.finish_write(result)
    }

    async fn update_workload(&self, workload: &Workload) -> Result<Workload, StoreError> {
        let mut state = self.state();
        let version = state.begin_write(
            "update",
            workload.kind().as_str(),
            &workload.namespace(),
            &workload.name(),
        )?;
        let result = match workload {
            Workload::Deployment(d) => state.deployments.update(d, version).map(Into::into),
            Workload::MeshDeployment(m) => {
                state.mesh_deployments.update(m, version).map(Into::into)
            }
        };
        state.finish_write(result)
    }

    async fn delete_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.begin_write("delete", kind.as_str(), namespace, name)?;
        let result = match kind {
            WorkloadKind::Deployment => state.deployments.delete(namespace, name),
            WorkloadKind::MeshDeployment => state.mesh_deployments.delete(namespace, name),
        };
        state.finish_write(result)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, StoreError> {
        self.state().config_maps.get(namespace, name)
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        let mut state = self.state();
        let (namespace, name) = object_id(config_map);
        let version = state.begin_write("create", KIND_CONFIG_MAP, &namespace, &name)?;
        let result = state.config_maps.create(config_map, version);
        state.finish_write(result)
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        let mut state = self.state();
        let (namespace, name) = object_id(config_map);
        let version = state.begin_write("update", KIND_CONFIG_MAP, &namespace, &name)?;
        let result = state.config_maps.update(config_map, version);
        state.finish_write(result)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.begin_write("delete", KIND_CONFIG_MAP, namespace, name)?;
        let result = state.config_maps.delete(namespace, name);
        state.finish_write(result)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.state().secrets.get(namespace, name)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let mut state = self.state();
        let (namespace, name) = object_id(secret);
        let version = state.begin_write("create", KIND_SECRET, &namespace, &name)?;
        let result = state.secrets.create(secret, version);
        state.finish_write(result)
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let mut state = self.state();
        let (namespace, name) = object_id(secret);
        let version = state.begin_write("update", KIND_SECRET, &namespace, &name)?;
        let result = state.secrets.update(secret, version);
        state.finish_write(result)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.begin_write("delete", KIND_SECRET, namespace, name)?;
        let result = state.secrets.delete(namespace, name);
        state.finish_write(result)
    }

    async fn get_service_canary(&self, name: &str) -> Result<ServiceCanary, StoreError> {
        self.state().canaries.get("", name)
    }

    async fn create_service_canary(
        &self,
        canary: &ServiceCanary,
    ) -> Result<ServiceCanary, StoreError> {
        let mut state = self.state();
        let (_, name) = object_id(canary);
        let version = state.begin_write("create", KIND_SERVICE_CANARY, "", &name)?;
        let result = state.canaries.create(canary, version);
        state.finish_write(result)
    }

    async fn update_service_canary(
        &self,
        canary: &ServiceCanary,
    ) -> Result<ServiceCanary, StoreError> {
        let mut state = self.state();
        let (_, name) = object_id(canary);
        if state.pending_canary_conflicts > 0 {
            state.pending_canary_conflicts -= 1;
            return Err(StoreError::Conflict {
                kind: KIND_SERVICE_CANARY.to_string(),
                namespace: String::new(),
                name,
            });
        }
        let version = state.begin_write("update", KIND_SERVICE_CANARY, "", &name)?;
        let result = state.canaries.update(canary, version);
        state.finish_write(result)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
