// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Locate the source workload a `ShadowService` mirrors.

use crate::crd::ShadowService;
use crate::errors::ShadowError;
use crate::store::ResourceStore;
use crate::workload::Workload;
use kube::ResourceExt;
use tracing::{debug, warn};

/// Find the single non-shadow workload in the shadow service's namespace serving
/// `spec.serviceName`.
///
/// Returns `Ok(None)` when no workload or more than one workload matches; both cases are
/// logged and the shadow service is skipped for this pass.
///
/// # Errors
///
/// Returns [`ShadowError::Store`] when listing workloads fails.
pub async fn search(
    store: &dyn ResourceStore,
    shadow_service: &ShadowService,
) -> Result<Option<Workload>, ShadowError> {
    let namespace = shadow_service.namespace().unwrap_or_default();
    let service_name = shadow_service.spec.service_name.as_str();

    let workloads = store
        .list_all_workloads(&namespace, None)
        .await
        .map_err(|e| ShadowError::store("list", "workloads", &namespace, "*", e))?;

    let mut matches: Vec<Workload> = workloads
        .into_iter()
        .filter(|w| !w.is_shadow())
        .filter(|w| w.service_name() == Some(service_name))
        .collect();

    match matches.len() {
        0 => {
            debug!(
                shadow_service = %shadow_service.key(),
                service = %service_name,
                "No source workload serves this service yet"
            );
            Ok(None)
        }
        1 => Ok(matches.pop()),
        n => {
            let candidates: Vec<String> = matches.iter().map(Workload::key).collect();
            warn!(
                shadow_service = %shadow_service.key(),
                service = %service_name,
                count = n,
                candidates = ?candidates,
                "Ambiguous source workload, skipping shadow service"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "searcher_tests.rs"]
mod searcher_tests;
