// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for `KubeStore` against a live cluster.
//!
//! These need a reachable cluster with the CRDs from deploy/crds/ installed.
//!
//! Run with: cargo test --test kube_store_integration -- --ignored

mod common;

use common::get_kube_client_or_skip;
use shadow_operator::store::{KubeStore, ResourceStore};
use shadow_operator::workload::WorkloadKind;
use std::time::Duration;

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_kube_store_lists_cluster_objects() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let store = KubeStore::new(client, Duration::from_secs(10));

    let namespaces = store.list_namespaces().await.expect("list namespaces");
    assert!(namespaces.iter().any(|ns| ns == "kube-system"));

    store
        .list_shadow_services()
        .await
        .expect("ShadowService CRD is installed");

    let shadows = store
        .list_workloads(
            WorkloadKind::Deployment,
            "kube-system",
            Some("mesh.megaease.com/shadow-service=true"),
        )
        .await
        .expect("list deployments");
    assert!(shadows.is_empty(), "kube-system never holds shadow workloads");
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_kube_store_reports_missing_objects_as_not_found() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let store = KubeStore::new(client, Duration::from_secs(10));

    let err = store
        .get_config_map("kube-system", "shadow-operator-does-not-exist")
        .await
        .expect_err("config map is absent");
    assert!(err.is_not_found(), "unexpected error: {err}");
}
