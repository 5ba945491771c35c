// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `memory.rs`

#[cfg(test)]
mod tests {
    use super::super::MemoryStore;
    use crate::errors::StoreError;
    use crate::store::ResourceStore;
    use crate::workload::{Workload, WorkloadKind};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }

    fn config_map(namespace: &str, name: &str) -> ConfigMap {
        ConfigMap {
            metadata: meta(namespace, name),
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_version_and_rejects_duplicates() {
        let store = MemoryStore::new();

        let created = store
            .create_config_map(&config_map("shop", "orders-cfg"))
            .await
            .expect("first create succeeds");
        assert!(created.metadata.resource_version.is_some());
        assert!(created.metadata.uid.is_some());

        let err = store
            .create_config_map(&config_map("shop", "orders-cfg"))
            .await
            .expect_err("duplicate create must fail");
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        // Arrange
        let store = MemoryStore::new();
        let first = store
            .create_config_map(&config_map("shop", "orders-cfg"))
            .await
            .expect("create");
        let second = store.update_config_map(&first).await.expect("fresh update");
        assert_ne!(
            first.metadata.resource_version,
            second.metadata.resource_version
        );

        // Act: reuse the now-stale first read
        let err = store
            .update_config_map(&first)
            .await
            .expect_err("stale update must fail");

        // Assert
        assert!(err.is_conflict(), "expected conflict, got {err:?}");
        assert_eq!(second.metadata.uid, first.metadata.uid, "uid is preserved");
    }

    #[tokio::test]
    async fn test_get_and_delete_missing_objects() {
        let store = MemoryStore::new();

        let err = store
            .get_workload(WorkloadKind::Deployment, "shop", "nope")
            .await
            .expect_err("missing workload");
        assert!(err.is_not_found());

        let err = store
            .delete_secret("shop", "nope")
            .await
            .expect_err("missing secret");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_workloads_filters_by_namespace_and_selector() {
        let store = MemoryStore::new();
        let mut shadow = Deployment {
            metadata: meta("shop", "orders-v1-shadow"),
            ..Default::default()
        };
        shadow.metadata.labels = Some(BTreeMap::from([(
            "mesh.megaease.com/shadow-service".to_string(),
            "true".to_string(),
        )]));
        store
            .seed_workload(Workload::from(shadow))
            .expect("seed shadow");
        store
            .seed_workload(Workload::from(Deployment {
                metadata: meta("shop", "orders-v1"),
                ..Default::default()
            }))
            .expect("seed source");
        store
            .seed_workload(Workload::from(Deployment {
                metadata: meta("other", "billing"),
                ..Default::default()
            }))
            .expect("seed other namespace");

        let all = store
            .list_all_workloads("shop", None)
            .await
            .expect("list");
        let shadows = store
            .list_workloads(
                WorkloadKind::Deployment,
                "shop",
                Some("mesh.megaease.com/shadow-service=true"),
            )
            .await
            .expect("list with selector");

        assert_eq!(all.len(), 2);
        assert_eq!(shadows.len(), 1);
        assert_eq!(shadows[0].name(), "orders-v1-shadow");
        assert_eq!(
            store.list_namespaces().await.expect("namespaces"),
            vec!["other".to_string(), "shop".to_string()]
        );
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryStore::new();
        store.fail_writes("ConfigMap", "shop", "orders-cfg");

        let err = store
            .create_config_map(&config_map("shop", "orders-cfg"))
            .await
            .expect_err("injected failure");

        assert!(matches!(err, StoreError::Api { code: 500, .. }));
        assert!(store.config_map("shop", "orders-cfg").is_none());
    }

    #[tokio::test]
    async fn test_unserved_kind_contributes_nothing_to_workload_listing() {
        let store = MemoryStore::new();
        store
            .seed_workload(Workload::from(Deployment {
                metadata: meta("shop", "orders-v1"),
                ..Default::default()
            }))
            .expect("seed deployment");
        store.unserve_kind(WorkloadKind::MeshDeployment);

        let direct = store
            .list_workloads(WorkloadKind::MeshDeployment, "shop", None)
            .await;
        let all = store
            .list_all_workloads("shop", None)
            .await
            .expect("missing CRD is not an error");

        assert!(matches!(direct, Err(StoreError::NotFound { .. })));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name(), "orders-v1");
    }
}
