// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ResourceStore`] backed by the Kubernetes API.
//!
//! Every call is bounded by the configured request timeout and every `kube::Error` is
//! translated into a [`StoreError`] that keeps the identity of the object involved.

use super::pagination::list_all_paginated;
use super::ResourceStore;
use crate::constants::{KIND_SERVICE_CANARY, KIND_SHADOW_SERVICE};
use crate::crd::{MeshDeployment, ServiceCanary, ShadowService};
use crate::errors::StoreError;
use crate::workload::{Workload, WorkloadKind};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Translate a Kubernetes client error into a [`StoreError`].
fn map_kube_error(
    err: kube::Error,
    operation: &str,
    kind: &str,
    namespace: &str,
    name: &str,
) -> StoreError {
    let identity = || (kind.to_string(), namespace.to_string(), name.to_string());
    match err {
        kube::Error::Api(ae) if ae.code == 404 => {
            let (kind, namespace, name) = identity();
            StoreError::NotFound {
                kind,
                namespace,
                name,
            }
        }
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            let (kind, namespace, name) = identity();
            StoreError::AlreadyExists {
                kind,
                namespace,
                name,
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => {
            let (kind, namespace, name) = identity();
            StoreError::Conflict {
                kind,
                namespace,
                name,
            }
        }
        kube::Error::Api(ae) => StoreError::Api {
            operation: operation.to_string(),
            code: ae.code,
            message: ae.message.clone(),
        },
        other => StoreError::Api {
            operation: operation.to_string(),
            code: 0,
            message: other.to_string(),
        },
    }
}

/// Kubernetes-backed resource store.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    timeout: Duration,
}

impl KubeStore {
    /// Create a store whose calls each give up after `timeout`.
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Run one API call under the request deadline.
    async fn call<T, F>(
        &self,
        verb: &str,
        kind: &str,
        namespace: &str,
        name: &str,
        fut: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, kube::Error>> + Send,
    {
        let operation = format!("{verb} {kind} {namespace}/{name}");
        debug!(operation = %operation, "Calling Kubernetes API");
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(map_kube_error(err, &operation, kind, namespace, name)),
            Err(_) => Err(StoreError::Timeout {
                operation,
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn list_namespaced<K>(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug
            + Send
            + Sync,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let kind = K::kind(&()).to_string();
        self.call("list", &kind, namespace, "*", list_all_paginated(&api, params))
            .await
    }

    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug
            + Send
            + Sync,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let kind = K::kind(&()).to_string();
        self.call("get", &kind, namespace, name, api.get(name)).await
    }

    async fn create_namespaced<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug
            + Send
            + Sync,
    {
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let kind = K::kind(&()).to_string();
        self.call(
            "create",
            &kind,
            &namespace,
            &name,
            api.create(&PostParams::default(), object),
        )
        .await
    }

    async fn replace_namespaced<K>(&self, object: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug
            + Send
            + Sync,
    {
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let kind = K::kind(&()).to_string();
        self.call(
            "update",
            &kind,
            &namespace,
            &name,
            api.replace(&name, &PostParams::default(), object),
        )
        .await
    }

    async fn delete_namespaced<K>(&self, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug
            + Send
            + Sync,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let kind = K::kind(&()).to_string();
        self.call(
            "delete",
            &kind,
            namespace,
            name,
            api.delete(name, &DeleteParams::default()),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = self
            .call(
                "list",
                "Namespace",
                "",
                "*",
                list_all_paginated(&api, ListParams::default()),
            )
            .await?;
        Ok(namespaces.iter().map(ResourceExt::name_any).collect())
    }

    async fn list_shadow_services(&self) -> Result<Vec<ShadowService>, StoreError> {
        let api: Api<ShadowService> = Api::all(self.client.clone());
        self.call(
            "list",
            KIND_SHADOW_SERVICE,
            "",
            "*",
            list_all_paginated(&api, ListParams::default()),
        )
        .await
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Workload>, StoreError> {
        Ok(match kind {
            WorkloadKind::Deployment => self
                .list_namespaced::<Deployment>(namespace, label_selector)
                .await?
                .into_iter()
                .map(Workload::from)
                .collect(),
            WorkloadKind::MeshDeployment => self
                .list_namespaced::<MeshDeployment>(namespace, label_selector)
                .await?
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
        Ok(match kind {
            WorkloadKind::Deployment => self
                .get_namespaced::<Deployment>(namespace, name)
                .await?
                .into(),
            WorkloadKind::MeshDeployment => self
                .get_namespaced::<MeshDeployment>(namespace, name)
                .await?
                .into(),
        })
    }

    async fn create_workload(&self, workload: &Workload) -> Result<Workload, StoreError> {
        Ok(match workload {
            Workload::Deployment(d) => self.create_namespaced(d).await?.into(),
            Workload::MeshDeployment(m) => self.create_namespaced(m).await?.into(),
        })
    }

    async fn update_workload(&self, workload: &Workload) -> Result<Workload, StoreError> {
        Ok(match workload {
            Workload::Deployment(d) => self.replace_namespaced(d).await?.into(),
            Workload::MeshDeployment(m) => self.replace_namespaced(m).await?.into(),
        })
    }

    async fn delete_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        match kind {
            WorkloadKind::Deployment => self.delete_namespaced::<Deployment>(namespace, name).await,
            WorkloadKind::MeshDeployment => {
                self.delete_namespaced::<MeshDeployment>(namespace, name)
                    .await
            }
        }
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, StoreError> {
        self.get_namespaced(namespace, name).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        self.create_namespaced(config_map).await
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        self.replace_namespaced(config_map).await
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_namespaced::<ConfigMap>(namespace, name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, StoreError> {
        self.get_namespaced(namespace, name).await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.create_namespaced(secret).await
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.replace_namespaced(secret).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_namespaced::<Secret>(namespace, name).await
    }

    async fn get_service_canary(&self, name: &str) -> Result<ServiceCanary, StoreError> {
        let api: Api<ServiceCanary> = Api::all(self.client.clone());
        self.call("get", KIND_SERVICE_CANARY, "", name, api.get(name))
            .await
    }

    async fn create_service_canary(
        &self,
        canary: &ServiceCanary,
    ) -> Result<ServiceCanary, StoreError> {
        let api: Api<ServiceCanary> = Api::all(self.client.clone());
        let name = canary.name_any();
        self.call(
            "create",
            KIND_SERVICE_CANARY,
            "",
            &name,
            api.create(&PostParams::default(), canary),
        )
        .await
    }

    async fn update_service_canary(
        &self,
        canary: &ServiceCanary,
    ) -> Result<ServiceCanary, StoreError> {
        let api: Api<ServiceCanary> = Api::all(self.client.clone());
        let name = canary.name_any();
        self.call(
            "update",
            KIND_SERVICE_CANARY,
            "",
            &name,
            api.replace(&name, &PostParams::default(), canary),
        )
        .await
    }
}
