// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Materialize a shadow workload and its ConfigMaps and Secrets.
//!
//! The shadow's ConfigMaps and Secrets are written first so the shadow pods never start
//! against a missing volume source. Each object is upserted independently; a failure is
//! reported with the identity of the object that failed and nothing already written is
//! rolled back. The next pass converges.

use super::resources::{upsert, StoredObject, UpsertOutcome};
use crate::constants::{KIND_CONFIG_MAP, KIND_SECRET};
use crate::crd::{ShadowConfigMap, ShadowSecret, ShadowService};
use crate::errors::{ShadowError, StoreError};
use crate::labels::{SHADOW_SERVICE_LABEL, SHADOW_SERVICE_LABEL_VALUE};
use crate::metrics;
use crate::mutator::build_shadow_workload;
use crate::naming::{shadow_volume_name, ShadowNaming};
use crate::store::ResourceStore;
use crate::workload::Workload;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::{error, info};

/// What one clone did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloneOutcome {
    /// `<namespace>/<name>` of the shadow workload
    pub shadow: String,
    /// Result of the workload upsert
    pub workload: UpsertOutcome,
    /// Results of the ConfigMap and Secret upserts, in write order
    pub sub_resources: Vec<(String, UpsertOutcome)>,
}

/// Metadata for a shadow copy: source labels and annotations, shadow label, new name, and
/// no server-populated identity.
fn shadow_meta(source: Option<&ObjectMeta>, namespace: &str, name: String) -> ObjectMeta {
    let mut labels = source.and_then(|m| m.labels.clone()).unwrap_or_default();
    labels.insert(
        SHADOW_SERVICE_LABEL.to_string(),
        SHADOW_SERVICE_LABEL_VALUE.to_string(),
    );
    let annotations = source
        .and_then(|m| m.annotations.clone())
        .map(|mut annotations| {
            annotations.remove("kubectl.kubernetes.io/last-applied-configuration");
            annotations
        })
        .filter(|annotations| !annotations.is_empty());
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        annotations,
        ..Default::default()
    }
}

/// Fetch a source object, treating absence as acceptable when `data_override` makes the
/// source unnecessary.
fn optional_source<T>(
    result: Result<T, StoreError>,
    has_override: bool,
) -> Result<Option<T>, StoreError> {
    match result {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() && has_override => Ok(None),
        Err(e) => Err(e),
    }
}

async fn shadow_config_map(
    store: &dyn ResourceStore,
    namespace: &str,
    shadow_name: &str,
    descriptor: &ShadowConfigMap,
) -> Result<ConfigMap, StoreError> {
    let source = optional_source(
        store.get_config_map(namespace, &descriptor.name).await,
        descriptor.data.is_some(),
    )?;
    let (data, binary_data) = match &descriptor.data {
        Some(data) => (Some(data.clone()), None),
        None => (
            source.as_ref().and_then(|s| s.data.clone()),
            source.as_ref().and_then(|s| s.binary_data.clone()),
        ),
    };
    Ok(ConfigMap {
        metadata: shadow_meta(
            source.as_ref().map(|s| &s.metadata),
            namespace,
            shadow_volume_name(&descriptor.name, shadow_name),
        ),
        data,
        binary_data,
        immutable: source.as_ref().and_then(|s| s.immutable),
    })
}

async fn shadow_secret(
    store: &dyn ResourceStore,
    namespace: &str,
    shadow_name: &str,
    descriptor: &ShadowSecret,
) -> Result<Secret, StoreError> {
    let source = optional_source(
        store.get_secret(namespace, &descriptor.name).await,
        descriptor.string_data.is_some(),
    )?;
    // Overrides are written as `data`; the API server never returns `stringData`.
    let data = match &descriptor.string_data {
        Some(overrides) => Some(
            overrides
                .iter()
                .map(|(key, value)| (key.clone(), ByteString(value.clone().into_bytes())))
                .collect(),
        ),
        None => source.as_ref().and_then(|s| s.data.clone()),
    };
    Ok(Secret {
        metadata: shadow_meta(
            source.as_ref().map(|s| &s.metadata),
            namespace,
            shadow_volume_name(&descriptor.name, shadow_name),
        ),
        data,
        string_data: None,
        type_: source.as_ref().and_then(|s| s.type_.clone()),
        immutable: source.as_ref().and_then(|s| s.immutable),
    })
}

/// Upsert one object, logging and counting the outcome.
async fn write<T: StoredObject>(
    store: &dyn ResourceStore,
    shadow_service: &ShadowService,
    object: &T,
) -> Result<UpsertOutcome, ShadowError> {
    let (kind, namespace, name) = (object.kind(), object.namespace(), object.name());
    match upsert(store, object).await {
        Ok(outcome) => {
            match outcome {
                UpsertOutcome::Created => metrics::record_resource_created(&kind),
                UpsertOutcome::Updated => metrics::record_resource_updated(&kind),
                UpsertOutcome::Unchanged => {}
            }
            info!(
                shadow_service = %shadow_service.key(),
                kind = %kind,
                namespace = %namespace,
                name = %name,
                outcome = outcome.as_str(),
                "Upserted shadow resource"
            );
            Ok(outcome)
        }
        Err(e) => {
            metrics::record_error(&kind, e.category());
            error!(
                shadow_service = %shadow_service.key(),
                kind = %kind,
                namespace = %namespace,
                name = %name,
                error = %e,
                "Failed to upsert shadow resource"
            );
            Err(ShadowError::store("upsert", &kind, &namespace, &name, e))
        }
    }
}

/// Create or refresh the shadow of `source` for `shadow_service`.
///
/// # Errors
///
/// Returns [`ShadowError::Validation`] before any write when the source cannot be mutated,
/// and [`ShadowError::Store`] naming the first object whose read or write failed.
pub async fn clone_shadow(
    store: &dyn ResourceStore,
    naming: &ShadowNaming,
    source: &Workload,
    shadow_service: &ShadowService,
) -> Result<CloneOutcome, ShadowError> {
    let shadow = build_shadow_workload(source, shadow_service, naming)?;
    let namespace = shadow.namespace();
    let shadow_name = shadow.name();
    let mut sub_resources = Vec::new();

    for descriptor in &shadow_service.spec.config_maps {
        let config_map = shadow_config_map(store, &namespace, &shadow_name, descriptor)
            .await
            .map_err(|e| {
                metrics::record_error(KIND_CONFIG_MAP, e.category());
                ShadowError::store("read", KIND_CONFIG_MAP, &namespace, &descriptor.name, e)
            })?;
        let outcome = write(store, shadow_service, &config_map).await?;
        sub_resources.push((format!("{KIND_CONFIG_MAP}/{}", config_map.name()), outcome));
    }

    for descriptor in &shadow_service.spec.secrets {
        let secret = shadow_secret(store, &namespace, &shadow_name, descriptor)
            .await
            .map_err(|e| {
                metrics::record_error(KIND_SECRET, e.category());
                ShadowError::store("read", KIND_SECRET, &namespace, &descriptor.name, e)
            })?;
        let outcome = write(store, shadow_service, &secret).await?;
        sub_resources.push((format!("{KIND_SECRET}/{}", secret.name()), outcome));
    }

    let workload = write(store, shadow_service, &shadow).await?;

    Ok(CloneOutcome {
        shadow: shadow.key(),
        workload,
        sub_resources,
    })
}

#[cfg(test)]
#[path = "cloner_tests.rs"]
mod cloner_tests;
