// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use super::super::{upsert, UpsertOutcome};
    use crate::store::MemoryStore;
    use crate::workload::{Workload, WorkloadKind};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    const TEST_NAMESPACE: &str = "shop";
    const TEST_NAME: &str = "orders-cfg-orders-v1-shadow";

    fn config_map(value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(TEST_NAME.to_string()),
                namespace: Some(TEST_NAMESPACE.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("mode".to_string(), value.to_string())])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_skips_then_updates() {
        let store = MemoryStore::new();

        // Absent: created
        let outcome = upsert(&store, &config_map("shadow")).await.expect("create");
        assert_eq!(outcome, UpsertOutcome::Created);

        // Same content: no write
        let writes = store.write_count();
        let outcome = upsert(&store, &config_map("shadow")).await.expect("noop");
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(store.write_count(), writes, "unchanged upsert must not write");

        // Changed content: updated in place
        let outcome = upsert(&store, &config_map("replay")).await.expect("update");
        assert_eq!(outcome, UpsertOutcome::Updated);
        let stored = store
            .config_map(TEST_NAMESPACE, TEST_NAME)
            .expect("config map present");
        assert_eq!(
            stored.data.and_then(|d| d.get("mode").cloned()).as_deref(),
            Some("replay")
        );
    }

    #[tokio::test]
    async fn test_upsert_preserves_uid_of_existing_object() {
        let store = MemoryStore::new();
        let created = store.seed_config_map(config_map("old")).expect("seed");

        upsert(&store, &config_map("new")).await.expect("update");

        let stored = store
            .config_map(TEST_NAMESPACE, TEST_NAME)
            .expect("config map present");
        assert_eq!(stored.metadata.uid, created.metadata.uid);
    }

    #[tokio::test]
    async fn test_upsert_workload() {
        let store = MemoryStore::new();
        let workload = Workload::from(Deployment {
            metadata: ObjectMeta {
                name: Some("orders-v1-shadow".to_string()),
                namespace: Some(TEST_NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        });

        assert_eq!(
            upsert(&store, &workload).await.expect("create"),
            UpsertOutcome::Created
        );
        assert!(store
            .workload(WorkloadKind::Deployment, TEST_NAMESPACE, "orders-v1-shadow")
            .is_some());
    }

    #[tokio::test]
    async fn test_upsert_propagates_store_failure() {
        let store = MemoryStore::new();
        store.fail_writes("ConfigMap", TEST_NAMESPACE, TEST_NAME);

        let err = upsert(&store, &config_map("shadow"))
            .await
            .expect_err("injected failure");

        assert!(err.is_retryable(), "500 is transient");
    }
}
