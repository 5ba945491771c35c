// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic create-or-update helpers over a [`ResourceStore`].
//!
//! [`upsert`] probes for the object, then either creates it or replaces it carrying the
//! existing `resourceVersion`. A create that races with another writer
//! (`AlreadyExists`) falls back to the update path once. Updates whose content already
//! matches are skipped.
//!
//! # Example
//!
//! ```rust,no_run
//! use shadow_operator::reconcilers::resources::upsert;
//! use shadow_operator::store::MemoryStore;
//! use k8s_openapi::api::core::v1::ConfigMap;
//!
//! # async fn example(store: MemoryStore, config_map: ConfigMap) {
//! let outcome = upsert(&store, &config_map).await;
//! # }
//! ```

use crate::constants::{KIND_CONFIG_MAP, KIND_SECRET};
use crate::errors::StoreError;
use crate::store::ResourceStore;
use crate::workload::Workload;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::debug;

/// What [`upsert`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    /// Lower-case verb used as a metrics label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

/// A namespaced object the engine writes through the store.
#[async_trait]
pub trait StoredObject: Clone + Send + Sync {
    fn kind(&self) -> String;
    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Whether `existing` already carries everything this desired object would write.
    fn same_content(&self, existing: &Self) -> bool;

    async fn fetch(&self, store: &dyn ResourceStore) -> Result<Self, StoreError>;
    async fn create(&self, store: &dyn ResourceStore) -> Result<Self, StoreError>;
    async fn update(&self, store: &dyn ResourceStore) -> Result<Self, StoreError>;

    fn namespace(&self) -> String {
        self.metadata().namespace.clone().unwrap_or_default()
    }

    fn name(&self) -> String {
        self.metadata().name.clone().unwrap_or_default()
    }
}

/// Every desired label and annotation is present on `existing`. Keys added by the API
/// server or other controllers are ignored.
fn same_meta(desired: &ObjectMeta, existing: &ObjectMeta) -> bool {
    fn contained(
        desired: Option<&BTreeMap<String, String>>,
        existing: Option<&BTreeMap<String, String>>,
    ) -> bool {
        desired.into_iter().flatten().all(|(key, value)| {
            existing.and_then(|existing| existing.get(key)) == Some(value)
        })
    }
    contained(desired.labels.as_ref(), existing.labels.as_ref())
        && contained(desired.annotations.as_ref(), existing.annotations.as_ref())
}

#[async_trait]
impl StoredObject for ConfigMap {
    fn kind(&self) -> String {
        KIND_CONFIG_MAP.to_string()
    }
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
    fn same_content(&self, existing: &Self) -> bool {
        same_meta(&self.metadata, &existing.metadata)
            && self.data == existing.data
            && self.binary_data == existing.binary_data
    }
    async fn fetch(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        let (namespace, name) = (StoredObject::namespace(self), StoredObject::name(self));
        store.get_config_map(&namespace, &name).await
    }
    async fn create(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        store.create_config_map(self).await
    }
    async fn update(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        store.update_config_map(self).await
    }
}

#[async_trait]
impl StoredObject for Secret {
    fn kind(&self) -> String {
        KIND_SECRET.to_string()
    }
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
    fn same_content(&self, existing: &Self) -> bool {
        same_meta(&self.metadata, &existing.metadata)
            && self.data == existing.data
            && self.type_ == existing.type_
    }
    async fn fetch(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        let (namespace, name) = (StoredObject::namespace(self), StoredObject::name(self));
        store.get_secret(&namespace, &name).await
    }
    async fn create(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        store.create_secret(self).await
    }
    async fn update(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        store.update_secret(self).await
    }
}

#[async_trait]
impl StoredObject for Workload {
    fn kind(&self) -> String {
        Workload::kind(self).to_string()
    }
    fn metadata(&self) -> &ObjectMeta {
        self.meta()
    }
    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        self.meta_mut()
    }
    // The spec hash annotation covers everything under `spec`.
    fn same_content(&self, existing: &Self) -> bool {
        same_meta(self.meta(), existing.meta()) && self.selector() == existing.selector()
    }
    async fn fetch(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        store
            .get_workload(Workload::kind(self), &Workload::namespace(self), &Workload::name(self))
            .await
    }
    async fn create(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        store.create_workload(self).await
    }
    async fn update(&self, store: &dyn ResourceStore) -> Result<Self, StoreError> {
        store.update_workload(self).await
    }
}

/// Replace `existing` with `desired`, unless it already matches.
async fn update_from<T: StoredObject>(
    store: &dyn ResourceStore,
    desired: &T,
    existing: &T,
) -> Result<UpsertOutcome, StoreError> {
    if desired.same_content(existing) {
        debug!(
            kind = %desired.kind(),
            namespace = %desired.namespace(),
            name = %desired.name(),
            "Resource is up to date, skipping update"
        );
        return Ok(UpsertOutcome::Unchanged);
    }
    let mut replacement = desired.clone();
    replacement.metadata_mut().resource_version = existing.metadata().resource_version.clone();
    replacement.metadata_mut().uid = existing.metadata().uid.clone();
    replacement.update(store).await?;
    debug!(
        "Updated {} {}/{}",
        desired.kind(),
        desired.namespace(),
        desired.name()
    );
    Ok(UpsertOutcome::Updated)
}

/// Create `desired`, or update the existing object of the same name.
///
/// # Errors
///
/// Returns the store error of the failing probe, create or update. A stale update surfaces
/// as [`StoreError::Conflict`]; the caller retries on its next pass.
pub async fn upsert<T: StoredObject>(
    store: &dyn ResourceStore,
    desired: &T,
) -> Result<UpsertOutcome, StoreError> {
    match desired.fetch(store).await {
        Ok(existing) => update_from(store, desired, &existing).await,
        Err(e) if e.is_not_found() => {
            debug!(
                kind = %desired.kind(),
                namespace = %desired.namespace(),
                name = %desired.name(),
                "Resource does not exist, creating"
            );
            match desired.create(store).await {
                Ok(_) => {
                    debug!(
                        "Created {} {}/{}",
                        desired.kind(),
                        desired.namespace(),
                        desired.name()
                    );
                    Ok(UpsertOutcome::Created)
                }
                Err(StoreError::AlreadyExists { .. }) => {
                    let existing = desired.fetch(store).await?;
                    update_from(store, desired, &existing).await
                }
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
