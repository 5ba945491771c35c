// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pure transformation of a source workload into its shadow.
//!
//! [`TemplateMutator::mutate`] turns the source pod template into the shadow pod template:
//!
//! 1. Strip mesh scaffolding (sidecar, agent initializer, their volumes and mounts). The mesh
//!    injector adds fresh copies when the shadow is admitted.
//! 2. Inject the shadow environment into the application container.
//! 3. Point ConfigMap/Secret volumes at the shadow copies.
//! 4. Label the pods as shadow instances.
//!
//! [`build_shadow_workload`] wraps the mutated template in a workload of the same kind,
//! named after the source, with the bookkeeping annotations the garbage collector and the
//! cloner rely on. Both functions are deterministic and idempotent on their own output.

pub mod env;
pub mod inject;

use crate::constants::{
    AGENT_INITIALIZER_CONTAINER_NAME, CANARY_NAME_LABEL_KEY, CANARY_NAME_LABEL_VALUE,
    MESH_INJECTED_VOLUMES, SIDECAR_CONTAINER_NAME,
};
use crate::crd::ShadowService;
use crate::errors::ShadowError;
use crate::labels::{
    APP_CONTAINER_NAME_ANNOTATION, SERVICE_LABELS_ANNOTATION, SHADOW_CONFIGMAPS_ANNOTATION,
    SHADOW_SECRETS_ANNOTATION, SHADOW_SERVICE_LABEL, SHADOW_SERVICE_LABEL_VALUE,
    SHADOW_SERVICE_NAME_ANNOTATION, SHADOW_SPEC_HASH_ANNOTATION,
};
use crate::naming::{shadow_volume_name, ShadowNaming};
use crate::workload::Workload;
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec, Volume};
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub use env::shadow_env_vars;
pub use inject::{inject_by_key, inject_by_name, remove_by_name, Named};

/// Annotations that describe the source object's history and must not leak to the shadow.
const SOURCE_ONLY_ANNOTATIONS: [&str; 2] = [
    "kubectl.kubernetes.io/last-applied-configuration",
    "deployment.kubernetes.io/revision",
];

/// `canary-name=shadow`, the instance labels the sidecar registers shadow pods with.
#[must_use]
pub fn canary_service_labels() -> String {
    format!("{CANARY_NAME_LABEL_KEY}={CANARY_NAME_LABEL_VALUE}")
}

/// Rewrites one pod template for one shadow service.
pub struct TemplateMutator<'a> {
    shadow_service: &'a ShadowService,
    shadow_workload_name: &'a str,
    app_container: Option<&'a str>,
}

impl<'a> TemplateMutator<'a> {
    /// `app_container` names the container receiving the shadow environment; when `None`,
    /// the template's own `app-container-name` annotation or its first non-sidecar
    /// container is used.
    #[must_use]
    pub fn new(
        shadow_service: &'a ShadowService,
        shadow_workload_name: &'a str,
        app_container: Option<&'a str>,
    ) -> Self {
        Self {
            shadow_service,
            shadow_workload_name,
            app_container,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ShadowError {
        ShadowError::validation(&self.shadow_service.key(), reason)
    }

    /// Produce the shadow pod template.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::Validation`] when the template has no containers or the
    /// application container cannot be found, and [`ShadowError::Serialization`] when the
    /// resource configuration cannot be encoded.
    pub fn mutate(&self, template: &PodTemplateSpec) -> Result<PodTemplateSpec, ShadowError> {
        let mut template = template.clone();
        let hint = self.app_container.map(str::to_string).or_else(|| {
            template
                .metadata
                .as_ref()
                .and_then(|meta| meta.annotations.as_ref())
                .and_then(|annotations| annotations.get(APP_CONTAINER_NAME_ANNOTATION))
                .cloned()
        });

        let Some(spec) = template.spec.as_mut() else {
            return Err(self.invalid("source pod template has no spec"));
        };

        // 1. Mesh scaffolding
        remove_by_name(&mut spec.containers, &[SIDECAR_CONTAINER_NAME]);
        if let Some(init_containers) = spec.init_containers.as_mut() {
            remove_by_name(init_containers, &[AGENT_INITIALIZER_CONTAINER_NAME]);
        }
        if let Some(volumes) = spec.volumes.as_mut() {
            remove_by_name(volumes, &MESH_INJECTED_VOLUMES);
        }
        for container in spec
            .containers
            .iter_mut()
            .chain(spec.init_containers.iter_mut().flatten())
        {
            strip_mesh_mounts(container);
        }

        if spec.containers.is_empty() {
            return Err(self.invalid("source pod template has no containers"));
        }

        // 2. Shadow environment
        let mut app = match hint.as_deref() {
            Some(name) => spec
                .containers
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .ok_or_else(|| self.invalid(format!("app container '{name}' not found")))?,
            None => spec.containers[0].clone(),
        };
        let env = shadow_env_vars(&self.shadow_service.spec.resource_config)?;
        inject_by_name(app.env.get_or_insert_with(Vec::new), env);
        inject_by_name(&mut spec.containers, [app]);

        // 3. ConfigMap/Secret volumes
        if let Some(volumes) = spec.volumes.as_mut() {
            for volume in volumes.iter_mut() {
                self.rename_volume_source(volume);
            }
        }

        // 4. Pod labels and annotations
        let meta = template.metadata.get_or_insert_with(Default::default);
        meta.labels.get_or_insert_with(BTreeMap::new).insert(
            SHADOW_SERVICE_LABEL.to_string(),
            SHADOW_SERVICE_LABEL_VALUE.to_string(),
        );
        meta.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(SERVICE_LABELS_ANNOTATION.to_string(), canary_service_labels());

        Ok(template)
    }

    /// Point a volume at the shadow copy of a listed ConfigMap or Secret.
    fn rename_volume_source(&self, volume: &mut Volume) {
        let spec = &self.shadow_service.spec;
        if let Some(config_map) = volume.config_map.as_mut() {
            if spec.config_maps.iter().any(|c| c.name == config_map.name) {
                config_map.name = shadow_volume_name(&config_map.name, self.shadow_workload_name);
            }
        }
        if let Some(secret) = volume.secret.as_mut() {
            if let Some(name) = secret.secret_name.as_mut() {
                if spec.secrets.iter().any(|s| s.name == *name) {
                    *name = shadow_volume_name(name, self.shadow_workload_name);
                }
            }
        }
    }
}

fn strip_mesh_mounts(container: &mut Container) {
    if let Some(mounts) = container.volume_mounts.as_mut() {
        mounts.retain(|mount| !MESH_INJECTED_VOLUMES.contains(&mount.name.as_str()));
    }
}

/// SHA-256 of a workload's whole spec in JSON form, lower-case hex.
///
/// Covers the pod template together with replicas, strategy, selector and, for a
/// `MeshDeployment`, the mesh service reference.
///
/// # Errors
///
/// Returns [`ShadowError::Serialization`] if the spec cannot be serialized.
pub fn spec_hash(workload: &Workload) -> Result<String, ShadowError> {
    let encoded = match workload {
        Workload::Deployment(d) => serde_json::to_vec(&d.spec),
        Workload::MeshDeployment(m) => serde_json::to_vec(&m.spec),
    };
    let bytes = encoded.map_err(|source| ShadowError::Serialization {
        what: format!("{} spec", workload.kind()),
        source,
    })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// `<namespace>/<name>` list of the shadow copies of `names`, comma-joined.
fn owned_objects<'n>(
    namespace: &str,
    shadow_workload_name: &str,
    names: impl Iterator<Item = &'n str>,
) -> String {
    names
        .map(|name| format!("{namespace}/{}", shadow_volume_name(name, shadow_workload_name)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the shadow workload mirroring `source` for `shadow_service`.
///
/// # Errors
///
/// Returns [`ShadowError::Validation`] when the source has no usable pod template, and any
/// error from [`TemplateMutator::mutate`].
pub fn build_shadow_workload(
    source: &Workload,
    shadow_service: &ShadowService,
    naming: &ShadowNaming,
) -> Result<Workload, ShadowError> {
    let shadow_name = naming.shadow_name(&source.name());
    let template = source.pod_template().ok_or_else(|| {
        ShadowError::validation(
            &shadow_service.key(),
            format!("{} {} has no pod template", source.kind(), source.key()),
        )
    })?;

    let mutator = TemplateMutator::new(
        shadow_service,
        &shadow_name,
        source.annotation(APP_CONTAINER_NAME_ANNOTATION),
    );
    let shadow_template = mutator.mutate(template)?;

    let mut shadow = source.clone();
    shadow.clear_server_fields();

    let namespace = source.namespace();
    let spec = &shadow_service.spec;
    let config_maps = owned_objects(
        &namespace,
        &shadow_name,
        spec.config_maps.iter().map(|c| c.name.as_str()),
    );
    let secrets = owned_objects(
        &namespace,
        &shadow_name,
        spec.secrets.iter().map(|s| s.name.as_str()),
    );

    let meta = shadow.meta_mut();
    meta.name = Some(shadow_name);
    meta.labels.get_or_insert_with(BTreeMap::new).insert(
        SHADOW_SERVICE_LABEL.to_string(),
        SHADOW_SERVICE_LABEL_VALUE.to_string(),
    );
    let annotations = meta.annotations.get_or_insert_with(BTreeMap::new);
    for key in SOURCE_ONLY_ANNOTATIONS {
        annotations.remove(key);
    }
    annotations.insert(
        SHADOW_SERVICE_NAME_ANNOTATION.to_string(),
        shadow_service.name_any(),
    );
    annotations.insert(SERVICE_LABELS_ANNOTATION.to_string(), canary_service_labels());
    annotations.insert(SHADOW_CONFIGMAPS_ANNOTATION.to_string(), config_maps);
    annotations.insert(SHADOW_SECRETS_ANNOTATION.to_string(), secrets);

    let mut match_labels = source
        .selector()
        .and_then(|selector| selector.match_labels.clone())
        .unwrap_or_default();
    match_labels.insert(
        SHADOW_SERVICE_LABEL.to_string(),
        SHADOW_SERVICE_LABEL_VALUE.to_string(),
    );
    shadow.set_selector_match_labels(match_labels);
    shadow.set_pod_template(shadow_template);

    let hash = spec_hash(&shadow)?;
    shadow
        .meta_mut()
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(SHADOW_SPEC_HASH_ANNOTATION.to_string(), hash);

    Ok(shadow)
}

/// Split a `<namespace>/<name>` list annotation back into its entries.
#[must_use]
pub fn parse_owned_objects(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|entry| entry.trim().split_once('/'))
        .filter(|(namespace, name)| !namespace.is_empty() && !name.is_empty())
        .map(|(namespace, name)| (namespace.to_string(), name.to_string()))
        .collect()
}
