// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for reconciler unit tests: the `shop/orders-v1` service and its shadow.

use crate::crd::{MySqlConfig, ShadowConfigMap, ShadowResourceConfig, ShadowService, ShadowServiceSpec};
use crate::store::MemoryStore;
use crate::workload::Workload;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "shop";

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// `shop/orders-shadow` targeting `orders-v1`, with a MySQL shadow and one ConfigMap.
pub fn orders_shadow_service() -> ShadowService {
    let mut svc = ShadowService::new(
        "orders-shadow",
        ShadowServiceSpec {
            service_name: "orders-v1".to_string(),
            config_maps: vec![ShadowConfigMap {
                name: "orders-cfg".to_string(),
                data: None,
            }],
            secrets: vec![],
            resource_config: ShadowResourceConfig {
                mysql: Some(MySqlConfig {
                    hosts: vec!["db:3306".to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            },
        },
    );
    svc.metadata.namespace = Some(NAMESPACE.to_string());
    svc
}

/// The meshed `shop/orders-v1` Deployment mounting `orders-cfg`.
pub fn orders_deployment() -> Workload {
    Workload::from(Deployment {
        metadata: ObjectMeta {
            name: Some("orders-v1".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            annotations: Some(labels(&[("mesh.megaease.com/service-name", "orders-v1")])),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(labels(&[("app", "orders")])),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(&[("app", "orders")])),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![
                        Container {
                            name: "orders".to_string(),
                            image: Some("orders:1.0".to_string()),
                            volume_mounts: Some(vec![VolumeMount {
                                name: "config".to_string(),
                                mount_path: "/etc/orders".to_string(),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        },
                        Container {
                            name: "easemesh-sidecar".to_string(),
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
            labels: Some(labels(&[("app", "orders")])),
            ..Default::default()
        },
        data: Some(labels(&[("db.url", "mysql://db-prod:3306/orders")])),
        ..Default::default()
    }
}

/// A store holding the orders Deployment, its ConfigMap and the shadow service.
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
