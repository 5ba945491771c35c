// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::client::Client;
use shadow_operator::config::OperatorConfig;
use shadow_operator::context::Context;
use shadow_operator::crd::{
    MySqlConfig, ShadowConfigMap, ShadowResourceConfig, ShadowService, ShadowServiceSpec,
};
use shadow_operator::store::MemoryStore;
use shadow_operator::workload::Workload;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "shop";

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

pub fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub fn orders_shadow_service() -> ShadowService {
    let mut svc = ShadowService::new(
        "orders-shadow",
        ShadowServiceSpec {
            service_name: "orders-v1".to_string(),
            config_maps: vec![ShadowConfigMap {
                name: "orders-cfg".to_string(),
                data: None,
            }],
            resource_config: ShadowResourceConfig {
                mysql: Some(MySqlConfig {
                    hosts: vec!["db:3306".to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        },
    );
    svc.metadata.namespace = Some(NAMESPACE.to_string());
    svc
}

/// The meshed `shop/orders-v1` Deployment: app container, injected sidecar, one
/// ConfigMap volume.
pub fn orders_deployment() -> Workload {
    let app_labels = string_map(&[("app", "orders")]);
    Workload::from(Deployment {
        metadata: ObjectMeta {
            name: Some("orders-v1".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(app_labels.clone()),
            annotations: Some(string_map(&[("mesh.megaease.com/service-name", "orders-v1")])),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(2),
            selector: LabelSelector {
                match_labels: Some(app_labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![
                        Container {
                            name: "orders".to_string(),
                            image: Some("registry.local/orders:1.4.2".to_string()),
                            volume_mounts: Some(vec![VolumeMount {
                                name: "config".to_string(),
                                mount_path: "/etc/orders".to_string(),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        },
                        Container {
                            name: "easemesh-sidecar".to_string(),
                            image: Some("megaease/easegress:latest".to_string()),
                            ..Default::default()
                        },
                    ],
                    volumes: Some(vec![Volume {
                        name: "config".to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: "orders-cfg".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

pub fn orders_config_map() -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some("orders-cfg".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(string_map(&[("application.yaml", "db: mysql://db-prod:3306")])),
        ..Default::default()
    }
}

/// A store holding the orders workload, its ConfigMap and `orders-shadow`.
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed_workload(orders_deployment())
        .expect("seed deployment");
    store
        .seed_config_map(orders_config_map())
        .expect("seed config map");
    store.put_shadow_service(orders_shadow_service());
    store
}

pub fn context(store: &MemoryStore) -> Arc<Context> {
    Arc::new(Context::new(
        Arc::new(store.clone()),
        OperatorConfig::default(),
    ))
}
