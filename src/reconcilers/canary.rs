// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registration of shadowed services with the cluster-wide `ServiceCanary`.
//!
//! The operator owns a single `ServiceCanary`, `shadow-service-canary`, whose
//! `selector.matchServices` lists every service that currently has a shadow. Requests
//! carrying `X-Mesh-Shadow: shadow` to one of those services are routed to instances
//! labelled `canary-name: shadow`.
//!
//! Several `ShadowService` objects may target the same service. The registrar keeps a
//! reference set per service name, so a service leaves the canary only when the last
//! `ShadowService` targeting it is gone.
//!
//! Every change is a read-modify-write of the singleton, retried with backoff when another
//! writer wins the race.

use super::retry::{conflict_backoff, retry_store_call};
use crate::constants::{
    CANARY_NAME_LABEL_KEY, CANARY_NAME_LABEL_VALUE, KIND_SERVICE_CANARY, SHADOW_CANARY_PRIORITY,
    SHADOW_SERVICE_CANARY_NAME, SHADOW_TRAFFIC_HEADER, SHADOW_TRAFFIC_HEADER_VALUE,
};
use crate::crd::{ServiceCanary, ServiceCanarySpec, ServiceSelector, StringMatch, TrafficRules};
use crate::errors::{ShadowError, StoreError};
use crate::metrics;
use crate::store::ResourceStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Canary spec routing shadow traffic to `services`, emitted sorted and deduplicated.
#[must_use]
pub fn shadow_canary_spec(services: &BTreeSet<String>) -> ServiceCanarySpec {
    ServiceCanarySpec {
        priority: SHADOW_CANARY_PRIORITY,
        selector: ServiceSelector {
            match_services: services.iter().cloned().collect(),
            match_instance_labels: BTreeMap::from([(
                CANARY_NAME_LABEL_KEY.to_string(),
                CANARY_NAME_LABEL_VALUE.to_string(),
            )]),
        },
        traffic_rules: TrafficRules {
            headers: BTreeMap::from([(
                SHADOW_TRAFFIC_HEADER.to_string(),
                StringMatch {
                    exact: Some(SHADOW_TRAFFIC_HEADER_VALUE.to_string()),
                    ..Default::default()
                },
            )]),
        },
    }
}

/// Maintains the shadow `ServiceCanary` and the per-service reference sets.
pub struct CanaryRegistrar {
    store: Arc<dyn ResourceStore>,
    max_attempts: u32,
    /// service name -> keys of the `ShadowService` objects referencing it
    refs: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl CanaryRegistrar {
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
            refs: Mutex::new(BTreeMap::new()),
        }
    }

    fn refs(&self) -> MutexGuard<'_, BTreeMap<String, BTreeSet<String>>> {
        self.refs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `(shadow service key, service name)` pairs currently registered.
    #[must_use]
    pub fn tracked(&self) -> Vec<(String, String)> {
        self.refs()
            .iter()
            .flat_map(|(service, keys)| keys.iter().map(move |key| (key.clone(), service.clone())))
            .collect()
    }

    /// Register `service_name` on behalf of the shadow service `shadow_key`.
    ///
    /// Idempotent: a pair that is already registered causes no store call.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::CanaryConflict`] when the canary keeps changing underneath,
    /// or [`ShadowError::Store`] for any other store failure. The pair is not recorded on
    /// failure, so the next pass retries.
    pub async fn on_activate(&self, shadow_key: &str, service_name: &str) -> Result<(), ShadowError> {
        if self
            .refs()
            .get(service_name)
            .is_some_and(|keys| keys.contains(shadow_key))
        {
            return Ok(());
        }

        self.modify(|services| services.insert(service_name.to_string()))
            .await?;
        self.refs()
            .entry(service_name.to_string())
            .or_default()
            .insert(shadow_key.to_string());
        info!(
            shadow_service = %shadow_key,
            service = %service_name,
            "Registered service with shadow canary"
        );
        Ok(())
    }

    /// Drop the reference of `shadow_key` to `service_name`, removing the service from the
    /// canary when no other shadow service references it.
    ///
    /// Deactivating an unknown pair or a service missing from the canary is a no-op. An
    /// empty service list leaves the canary object in place.
    ///
    /// # Errors
    ///
    /// Same as [`CanaryRegistrar::on_activate`]. The reference is dropped only on success.
    pub async fn on_deactivate(
        &self,
        shadow_key: &str,
        service_name: &str,
    ) -> Result<(), ShadowError> {
        let still_referenced = self.refs().get(service_name).is_some_and(|keys| {
            keys.iter().any(|key| key != shadow_key)
        });
        if !still_referenced {
            self.modify(|services| services.remove(service_name)).await?;
            info!(
                shadow_service = %shadow_key,
                service = %service_name,
                "Removed service from shadow canary"
            );
        }

        let mut refs = self.refs();
        if let Some(keys) = refs.get_mut(service_name) {
            keys.remove(shadow_key);
            if keys.is_empty() {
                refs.remove(service_name);
            }
        }
        Ok(())
    }

    /// Remove every canary entry not in `active`.
    ///
    /// Covers shadow services deleted while the operator was not running.
    ///
    /// # Errors
    ///
    /// Same as [`CanaryRegistrar::on_activate`].
    pub async fn prune(&self, active: &BTreeSet<String>) -> Result<(), ShadowError> {
        self.modify(|services| {
            let before = services.len();
            services.retain(|service| active.contains(service));
            if services.len() != before {
                info!(
                    removed = before - services.len(),
                    "Pruned stale services from shadow canary"
                );
            }
            services.len() != before
        })
        .await
    }

    /// Read-modify-write the canary with bounded conflict retries.
    async fn modify<F>(&self, change: F) -> Result<(), ShadowError>
    where
        F: Fn(&mut BTreeSet<String>) -> bool + Send + Sync,
    {
        let result = retry_store_call(
            || self.try_modify(&change),
            "update ServiceCanary",
            conflict_backoff(),
            self.max_attempts,
        )
        .await;

        match result {
            Ok(count) => {
                metrics::set_canary_services(count);
                Ok(())
            }
            Err(e) if e.is_conflict() => {
                metrics::record_error(KIND_SERVICE_CANARY, e.category());
                Err(ShadowError::CanaryConflict {
                    name: SHADOW_SERVICE_CANARY_NAME.to_string(),
                    attempts: self.max_attempts,
                })
            }
            Err(e) => {
                metrics::record_error(KIND_SERVICE_CANARY, e.category());
                Err(ShadowError::store(
                    "update",
                    KIND_SERVICE_CANARY,
                    "",
                    SHADOW_SERVICE_CANARY_NAME,
                    e,
                ))
            }
        }
    }

    /// One attempt. Returns the number of services listed afterwards.
    async fn try_modify<F>(&self, change: &F) -> Result<usize, StoreError>
    where
        F: Fn(&mut BTreeSet<String>) -> bool + Send + Sync,
    {
        match self.store.get_service_canary(SHADOW_SERVICE_CANARY_NAME).await {
            Ok(mut canary) => {
                let mut services: BTreeSet<String> =
                    canary.spec.selector.match_services.iter().cloned().collect();
                let changed = change(&mut services);
                let desired = shadow_canary_spec(&services);
                if !changed && canary.spec == desired {
                    debug!("Shadow canary already up to date");
                    return Ok(services.len());
                }
                canary.spec = desired;
                self.store.update_service_canary(&canary).await?;
                Ok(services.len())
            }
            Err(e) if e.is_not_found() => {
                let mut services = BTreeSet::new();
                if !change(&mut services) {
                    return Ok(0);
                }
                let canary =
                    ServiceCanary::new(SHADOW_SERVICE_CANARY_NAME, shadow_canary_spec(&services));
                match self.store.create_service_canary(&canary).await {
                    Ok(_) => {
                        info!(name = SHADOW_SERVICE_CANARY_NAME, "Created shadow canary");
                        Ok(services.len())
                    }
                    // Lost a creation race; retry as an update.
                    Err(StoreError::AlreadyExists {
                        kind,
                        namespace,
                        name,
                    }) => Err(StoreError::Conflict {
                        kind,
                        namespace,
                        name,
                    }),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "canary_tests.rs"]
mod canary_tests;
