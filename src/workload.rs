// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The closed set of workload kinds a `ShadowService` can mirror.
//!
//! Both an apps/v1 `Deployment` and the mesh's `MeshDeployment` carry a pod template and a
//! label selector. [`Workload`] exposes exactly that narrow surface so the template mutator,
//! searcher, cloner and garbage collector are written once for every kind.

use crate::constants::{KIND_DEPLOYMENT, KIND_MESH_DEPLOYMENT};
use crate::crd::MeshDeployment;
use crate::labels::{SERVICE_NAME_ANNOTATION, SHADOW_SERVICE_LABEL, SHADOW_SERVICE_LABEL_VALUE};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;

/// Kind tag of a [`Workload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkloadKind {
    Deployment,
    MeshDeployment,
}

impl WorkloadKind {
    /// Every kind, in the order the store lists them.
    pub const ALL: [WorkloadKind; 2] = [WorkloadKind::Deployment, WorkloadKind::MeshDeployment];

    /// Kubernetes kind name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadKind::Deployment => KIND_DEPLOYMENT,
            WorkloadKind::MeshDeployment => KIND_MESH_DEPLOYMENT,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Deployment-like object with a pod template.
#[derive(Clone, Debug, PartialEq)]
pub enum Workload {
    Deployment(Deployment),
    MeshDeployment(MeshDeployment),
}

impl From<Deployment> for Workload {
    fn from(deployment: Deployment) -> Self {
        Workload::Deployment(deployment)
    }
}

impl From<MeshDeployment> for Workload {
    fn from(mesh_deployment: MeshDeployment) -> Self {
        Workload::MeshDeployment(mesh_deployment)
    }
}

impl Workload {
    #[must_use]
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::MeshDeployment(_) => WorkloadKind::MeshDeployment,
        }
    }

    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Workload::Deployment(d) => d.meta(),
            Workload::MeshDeployment(m) => m.meta(),
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Workload::Deployment(d) => d.meta_mut(),
            Workload::MeshDeployment(m) => m.meta_mut(),
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Workload::Deployment(d) => d.name_any(),
            Workload::MeshDeployment(m) => m.name_any(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        self.meta().namespace.clone().unwrap_or_default()
    }

    /// `<namespace>/<name>`, used in logs.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.meta()
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.meta()
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// Mesh service the workload serves: the `service-name` annotation, falling back to a
    /// `MeshDeployment`'s own service reference.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.annotation(SERVICE_NAME_ANNOTATION).or(match self {
            Workload::Deployment(_) => None,
            Workload::MeshDeployment(m) => Some(m.spec.service.name.as_str()),
        })
    }

    /// Whether the workload carries the shadow label.
    #[must_use]
    pub fn is_shadow(&self) -> bool {
        self.label(SHADOW_SERVICE_LABEL) == Some(SHADOW_SERVICE_LABEL_VALUE)
    }

    /// The pod template, if the workload has a spec at all.
    #[must_use]
    pub fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            Workload::Deployment(d) => d.spec.as_ref().map(|spec| &spec.template),
            Workload::MeshDeployment(m) => Some(&m.spec.deploy.template),
        }
    }

    /// Replace the pod template, creating an empty spec first when needed.
    pub fn set_pod_template(&mut self, template: PodTemplateSpec) {
        match self {
            Workload::Deployment(d) => d.spec.get_or_insert_with(Default::default).template = template,
            Workload::MeshDeployment(m) => m.spec.deploy.template = template,
        }
    }

    #[must_use]
    pub fn selector(&self) -> Option<&LabelSelector> {
        match self {
            Workload::Deployment(d) => d.spec.as_ref().map(|spec| &spec.selector),
            Workload::MeshDeployment(m) => Some(&m.spec.deploy.selector),
        }
    }

    /// Replace the selector's `matchLabels`.
    pub fn set_selector_match_labels(&mut self, match_labels: BTreeMap<String, String>) {
        let selector = match self {
            Workload::Deployment(d) => &mut d.spec.get_or_insert_with(Default::default).selector,
            Workload::MeshDeployment(m) => &mut m.spec.deploy.selector,
        };
        selector.match_labels = Some(match_labels);
    }

    /// Drop server-populated identity so the object can be written as new.
    pub fn clear_server_fields(&mut self) {
        let meta = self.meta_mut();
        meta.resource_version = None;
        meta.uid = None;
        meta.creation_timestamp = None;
        meta.generation = None;
        meta.managed_fields = None;
        meta.owner_references = None;
        meta.deletion_timestamp = None;
        meta.deletion_grace_period_seconds = None;
        meta.finalizers = None;
        match self {
            Workload::Deployment(d) => d.status = None,
            Workload::MeshDeployment(_) => {}
        }
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod workload_tests;
