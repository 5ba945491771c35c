// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Garbage collection of shadow workloads that no longer have a reason to exist.
//!
//! A shadow workload is deletable when either:
//!
//! - **(a)** its `shadow-service-name` annotation is missing or names a `ShadowService`
//!   that no longer exists in its namespace, or
//! - **(b)** its source workload (same kind, name from [`ShadowNaming::source_name`]) is
//!   gone, or no longer serves the `ShadowService`'s `serviceName`.
//!
//! [`find_deletable`] streams candidates into a channel so deletion runs concurrently with
//! the scan. [`delete`] removes the workload first and then the ConfigMaps and Secrets it
//! lists, continuing past individual failures.

use crate::constants::{KIND_CONFIG_MAP, KIND_SECRET};
use crate::crd::ShadowService;
use crate::errors::{ShadowError, StoreError};
use crate::labels::{
    SHADOW_CONFIGMAPS_ANNOTATION, SHADOW_SECRETS_ANNOTATION, SHADOW_SERVICE_NAME_ANNOTATION,
    SHADOW_SERVICE_SELECTOR,
};
use crate::metrics;
use crate::mutator::parse_owned_objects;
use crate::naming::ShadowNaming;
use crate::store::ResourceStore;
use crate::workload::Workload;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Why a shadow workload is deletable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteReason {
    /// No reverse link annotation at all
    MissingOwner,
    /// The linked `ShadowService` no longer exists
    OwnerGone(String),
    /// The name does not carry the shadow suffix, so no source can be derived
    UnknownSource,
    /// The source workload no longer exists
    SourceGone(String),
    /// The source workload now serves another service
    SourceRelabelled { source: String, service: String },
}

/// A shadow workload queued for deletion.
#[derive(Clone, Debug)]
pub struct Deletable {
    pub workload: Workload,
    pub reason: DeleteReason,
}

/// What [`delete`] removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// `<kind>/<namespace>/<name>` of every object removed (or already absent)
    pub deleted: Vec<String>,
    /// `<kind>/<namespace>/<name>` of every sub-resource that could not be removed
    pub failed: Vec<String>,
}

/// Decide whether one shadow workload is deletable.
///
/// Returns `Ok(None)` for intact shadows and `Err` when the source lookup fails for a
/// reason other than absence; the shadow is then kept until a later pass can decide.
async fn classify(
    store: &dyn ResourceStore,
    lookup: &HashMap<String, &ShadowService>,
    naming: &ShadowNaming,
    shadow: &Workload,
) -> Result<Option<DeleteReason>, StoreError> {
    let namespace = shadow.namespace();
    let Some(owner) = shadow.annotation(SHADOW_SERVICE_NAME_ANNOTATION) else {
        return Ok(Some(DeleteReason::MissingOwner));
    };
    let owner_key = format!("{namespace}/{owner}");
    let Some(shadow_service) = lookup.get(&owner_key) else {
        return Ok(Some(DeleteReason::OwnerGone(owner_key)));
    };
    let Some(source_name) = naming.source_name(&shadow.name()) else {
        return Ok(Some(DeleteReason::UnknownSource));
    };

    match store
        .get_workload(shadow.kind(), &namespace, &source_name)
        .await
    {
        Ok(source) => {
            let service = shadow_service.spec.service_name.as_str();
            if source.service_name() == Some(service) {
                Ok(None)
            } else {
                Ok(Some(DeleteReason::SourceRelabelled {
                    source: source.key(),
                    service: service.to_string(),
                }))
            }
        }
        Err(e) if e.is_not_found() => Ok(Some(DeleteReason::SourceGone(format!(
            "{namespace}/{source_name}"
        )))),
        Err(e) => Err(e),
    }
}

/// Scan every namespace for deletable shadow workloads and send them to `tx`.
///
/// Stops early when the receiver is dropped. Returns the number of candidates sent.
///
/// # Errors
///
/// Returns [`ShadowError::Store`] when namespaces cannot be listed. Failures within one
/// namespace or for one workload are logged and skipped.
pub async fn find_deletable(
    store: &dyn ResourceStore,
    shadow_services: &[ShadowService],
    naming: &ShadowNaming,
    tx: mpsc::Sender<Deletable>,
) -> Result<usize, ShadowError> {
    let lookup: HashMap<String, &ShadowService> =
        shadow_services.iter().map(|svc| (svc.key(), svc)).collect();

    let namespaces = store
        .list_namespaces()
        .await
        .map_err(|e| ShadowError::store("list", "Namespace", "", "*", e))?;

    let mut sent = 0;
    for namespace in namespaces {
        let shadows = match store
            .list_all_workloads(&namespace, Some(SHADOW_SERVICE_SELECTOR))
            .await
        {
            Ok(shadows) => shadows,
            Err(e) => {
                metrics::record_error("workloads", e.category());
                warn!(namespace = %namespace, error = %e, "Failed to list shadow workloads");
                continue;
            }
        };

        for shadow in shadows {
            match classify(store, &lookup, naming, &shadow).await {
                Ok(Some(reason)) => {
                    debug!(
                        kind = %shadow.kind(),
                        namespace = %namespace,
                        name = %shadow.name(),
                        reason = ?reason,
                        "Shadow workload is deletable"
                    );
                    if tx
                        .send(Deletable {
                            workload: shadow,
                            reason,
                        })
                        .await
                        .is_err()
                    {
                        debug!("Delete queue closed, stopping scan");
                        return Ok(sent);
                    }
                    sent += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    metrics::record_error(shadow.kind().as_str(), e.category());
                    warn!(
                        kind = %shadow.kind(),
                        namespace = %namespace,
                        name = %shadow.name(),
                        error = %e,
                        "Cannot decide whether shadow workload is deletable, keeping it"
                    );
                }
            }
        }
    }
    Ok(sent)
}

/// Delete one owned sub-resource, recording the outcome in `report`.
async fn delete_owned(
    store: &dyn ResourceStore,
    kind: &str,
    namespace: &str,
    name: &str,
    report: &mut DeleteReport,
) {
    let id = format!("{kind}/{namespace}/{name}");
    let result = if kind == KIND_CONFIG_MAP {
        store.delete_config_map(namespace, name).await
    } else {
        store.delete_secret(namespace, name).await
    };
    match result {
        Ok(()) => {
            metrics::record_resource_deleted(kind);
            info!(kind, namespace, name, "Deleted shadow resource");
            report.deleted.push(id);
        }
        Err(e) if e.is_not_found() => {
            debug!(kind, namespace, name, "Shadow resource already gone");
            report.deleted.push(id);
        }
        Err(e) => {
            metrics::record_error(kind, e.category());
            error!(kind, namespace, name, error = %e, "Failed to delete shadow resource");
            report.failed.push(id);
        }
    }
}

/// Delete a shadow workload, then the ConfigMaps and Secrets it owns.
///
/// Owned objects outside the workload's namespace are never touched.
///
/// # Errors
///
/// Returns [`ShadowError::Store`] when the workload itself cannot be deleted; its
/// sub-resources are then left for a later pass. Sub-resource failures are reported in
/// [`DeleteReport::failed`] instead.
pub async fn delete(
    store: &dyn ResourceStore,
    shadow: &Workload,
) -> Result<DeleteReport, ShadowError> {
    let kind = shadow.kind();
    let namespace = shadow.namespace();
    let name = shadow.name();
    let mut report = DeleteReport::default();

    match store.delete_workload(kind, &namespace, &name).await {
        Ok(()) => {
            metrics::record_resource_deleted(kind.as_str());
            info!(kind = %kind, namespace = %namespace, name = %name, "Deleted shadow workload");
        }
        Err(e) if e.is_not_found() => {
            debug!(kind = %kind, namespace = %namespace, name = %name, "Shadow workload already gone");
        }
        Err(e) => {
            metrics::record_error(kind.as_str(), e.category());
            error!(kind = %kind, namespace = %namespace, name = %name, error = %e, "Failed to delete shadow workload");
            return Err(ShadowError::store("delete", kind.as_str(), &namespace, &name, e));
        }
    }
    report.deleted.push(format!("{kind}/{namespace}/{name}"));

    for (annotation, owned_kind) in [
        (SHADOW_CONFIGMAPS_ANNOTATION, KIND_CONFIG_MAP),
        (SHADOW_SECRETS_ANNOTATION, KIND_SECRET),
    ] {
        let owned = shadow
            .annotation(annotation)
            .map(parse_owned_objects)
            .unwrap_or_default();
        for (owned_namespace, owned_name) in owned {
            if owned_namespace != namespace {
                warn!(
                    kind = owned_kind,
                    namespace = %owned_namespace,
                    name = %owned_name,
                    shadow = %shadow.key(),
                    "Refusing to delete a resource outside the shadow's namespace"
                );
                continue;
            }
            delete_owned(store, owned_kind, &owned_namespace, &owned_name, &mut report).await;
        }
    }

    Ok(report)
}

#[cfg(test)]
#[path = "deleter_tests.rs"]
mod deleter_tests;
