// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cloner.rs`

#[cfg(test)]
mod tests {
    use super::super::clone_shadow;
    use crate::crd::{ShadowConfigMap, ShadowSecret};
    use crate::errors::ShadowError;
    use crate::naming::ShadowNaming;
    use crate::reconcilers::resources::UpsertOutcome;
    use crate::reconcilers::test_fixtures::{
        labels, orders_deployment, orders_shadow_service, seeded_store, NAMESPACE,
    };
    use crate::workload::{Workload, WorkloadKind};
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    /// `orders_deployment` scaled to `replicas` and running `image`.
    fn rolled_out(replicas: i32, image: &str) -> Workload {
        let Workload::Deployment(mut deployment) = orders_deployment() else {
            unreachable!("orders-v1 is a Deployment");
        };
        let spec = deployment.spec.as_mut().expect("deployment spec");
        spec.replicas = Some(replicas);
        spec.template.spec.as_mut().expect("pod spec").containers[0].image =
            Some(image.to_string());
        Workload::from(deployment)
    }

    fn shadow_deployment_of(store: &crate::store::MemoryStore) -> (Option<i32>, Option<String>) {
        let Some(Workload::Deployment(shadow)) =
            store.workload(WorkloadKind::Deployment, NAMESPACE, "orders-v1-shadow")
        else {
            panic!("shadow deployment missing");
        };
        let spec = shadow.spec.expect("shadow spec");
        let image = spec.template.spec.expect("pod spec").containers[0].image.clone();
        (spec.replicas, image)
    }

    #[tokio::test]
    async fn test_clone_orders_v1() {
        // Arrange
        let store = seeded_store();
        let svc = orders_shadow_service();

        // Act
        let outcome = clone_shadow(&store, &ShadowNaming::default(), &orders_deployment(), &svc)
            .await
            .expect("clone succeeds");

        // Assert
        assert_eq!(outcome.shadow, "shop/orders-v1-shadow");
        assert_eq!(outcome.workload, UpsertOutcome::Created);

        let config_map = store
            .config_map(NAMESPACE, "orders-cfg-orders-v1-shadow")
            .expect("shadow config map created");
        assert_eq!(
            config_map.data,
            Some(labels(&[("db.url", "mysql://db-prod:3306/orders")])),
            "data is copied from the source"
        );
        assert_eq!(
            config_map
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("mesh.megaease.com/shadow-service"))
                .map(String::as_str),
            Some("true")
        );

        let shadow = store
            .workload(WorkloadKind::Deployment, NAMESPACE, "orders-v1-shadow")
            .expect("shadow workload created");
        assert_eq!(
            shadow.annotation("mesh.megaease.com/shadow-configmaps"),
            Some("shop/orders-cfg-orders-v1-shadow")
        );
        let spec = shadow
            .pod_template()
            .and_then(|t| t.spec.clone())
            .expect("pod spec");
        let env = spec.containers[0].env.clone().unwrap_or_default();
        assert_eq!(env[0].name, "EASE_RESOURCE_DATABASE");
        assert_eq!(env[0].value.as_deref(), Some(r#"{"hosts":["db:3306"]}"#));
        let volume = &spec.volumes.unwrap_or_default()[0];
        assert_eq!(
            volume.config_map.as_ref().map(|c| c.name.as_str()),
            Some("orders-cfg-orders-v1-shadow")
        );
    }

    #[tokio::test]
    async fn test_second_clone_is_a_noop() {
        let store = seeded_store();
        let svc = orders_shadow_service();
        let naming = ShadowNaming::default();
        clone_shadow(&store, &naming, &orders_deployment(), &svc)
            .await
            .expect("first clone");
        let writes = store.write_count();

        let outcome = clone_shadow(&store, &naming, &orders_deployment(), &svc)
            .await
            .expect("second clone");

        assert_eq!(outcome.workload, UpsertOutcome::Unchanged);
        assert!(outcome
            .sub_resources
            .iter()
            .all(|(_, o)| *o == UpsertOutcome::Unchanged));
        assert_eq!(store.write_count(), writes, "nothing changed, nothing written");
    }

    #[tokio::test]
    async fn test_override_data_replaces_source_data() {
        let store = seeded_store();
        let mut svc = orders_shadow_service();
        svc.spec.config_maps = vec![ShadowConfigMap {
            name: "orders-cfg".to_string(),
            data: Some(labels(&[("db.url", "mysql://db-shadow:3306/orders")])),
        }];
        svc.spec.secrets = vec![ShadowSecret {
            name: "orders-secret".to_string(),
            string_data: Some(labels(&[("password", "shadow")])),
        }];

        clone_shadow(&store, &ShadowNaming::default(), &orders_deployment(), &svc)
            .await
            .expect("clone with overrides, even without a source Secret");

        let config_map = store
            .config_map(NAMESPACE, "orders-cfg-orders-v1-shadow")
            .expect("shadow config map");
        assert_eq!(
            config_map.data,
            Some(labels(&[("db.url", "mysql://db-shadow:3306/orders")]))
        );
        let secret = store
            .secret(NAMESPACE, "orders-secret-orders-v1-shadow")
            .expect("shadow secret");
        assert_eq!(
            secret.data,
            Some(BTreeMap::from([(
                "password".to_string(),
                ByteString(b"shadow".to_vec())
            )]))
        );
        assert!(secret.string_data.is_none());
    }

    #[tokio::test]
    async fn test_secret_override_is_stable_across_clones() {
        let store = seeded_store();
        let mut svc = orders_shadow_service();
        svc.spec.secrets = vec![ShadowSecret {
            name: "orders-secret".to_string(),
            string_data: Some(labels(&[("password", "shadow")])),
        }];
        let naming = ShadowNaming::default();
        clone_shadow(&store, &naming, &orders_deployment(), &svc)
            .await
            .expect("first clone");
        let writes = store.write_count();

        let outcome = clone_shadow(&store, &naming, &orders_deployment(), &svc)
            .await
            .expect("second clone");

        assert!(outcome
            .sub_resources
            .iter()
            .all(|(_, o)| *o == UpsertOutcome::Unchanged));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_source_spec_change_reaches_shadow() {
        // Arrange
        let store = seeded_store();
        let svc = orders_shadow_service();
        let naming = ShadowNaming::default();
        clone_shadow(&store, &naming, &orders_deployment(), &svc)
            .await
            .expect("first clone");

        // Act
        let outcome = clone_shadow(&store, &naming, &rolled_out(5, "orders:2.0"), &svc)
            .await
            .expect("second clone");

        // Assert
        assert_eq!(outcome.workload, UpsertOutcome::Updated);
        assert_eq!(
            shadow_deployment_of(&store),
            (Some(5), Some("orders:2.0".to_string()))
        );
    }

    #[tokio::test]
    async fn test_replica_change_alone_reaches_shadow() {
        let store = seeded_store();
        let svc = orders_shadow_service();
        let naming = ShadowNaming::default();
        clone_shadow(&store, &naming, &orders_deployment(), &svc)
            .await
            .expect("first clone");

        let outcome = clone_shadow(&store, &naming, &rolled_out(5, "orders:1.0"), &svc)
            .await
            .expect("second clone");

        assert_eq!(outcome.workload, UpsertOutcome::Updated);
        assert_eq!(shadow_deployment_of(&store).0, Some(5));
    }

    #[tokio::test]
    async fn test_missing_source_secret_names_the_object() {
        let store = seeded_store();
        let mut svc = orders_shadow_service();
        svc.spec.secrets = vec![ShadowSecret {
            name: "orders-secret".to_string(),
            string_data: None,
        }];

        let err = clone_shadow(&store, &ShadowNaming::default(), &orders_deployment(), &svc)
            .await
            .expect_err("source secret missing");

        assert!(
            err.to_string().contains("Secret 'shop/orders-secret'"),
            "error should name the object, got: {err}"
        );
        assert!(
            store
                .workload(WorkloadKind::Deployment, NAMESPACE, "orders-v1-shadow")
                .is_none(),
            "workload is written after its sub-resources"
        );
        assert!(
            store
                .config_map(NAMESPACE, "orders-cfg-orders-v1-shadow")
                .is_some(),
            "no rollback of objects already written"
        );
    }

    #[tokio::test]
    async fn test_failed_upsert_is_wrapped() {
        let store = seeded_store();
        store.fail_writes("Deployment", NAMESPACE, "orders-v1-shadow");

        let err = clone_shadow(
            &store,
            &ShadowNaming::default(),
            &orders_deployment(),
            &orders_shadow_service(),
        )
        .await
        .expect_err("injected failure");

        match err {
            ShadowError::Store {
                operation,
                kind,
                name,
                ..
            } => {
                assert_eq!(operation, "upsert");
                assert_eq!(kind, "Deployment");
                assert_eq!(name, "orders-v1-shadow");
            }
            other => panic!("expected store error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_existing_secret_copied() {
        let store = seeded_store();
        store
            .seed_secret(Secret {
                metadata: ObjectMeta {
                    name: Some("orders-secret".to_string()),
                    namespace: Some(NAMESPACE.to_string()),
                    ..Default::default()
                },
                type_: Some("Opaque".to_string()),
                ..Default::default()
            })
            .expect("seed secret");
        let mut svc = orders_shadow_service();
        svc.spec.secrets = vec![ShadowSecret {
            name: "orders-secret".to_string(),
            string_data: None,
        }];

        clone_shadow(&store, &ShadowNaming::default(), &orders_deployment(), &svc)
            .await
            .expect("clone");

        let secret = store
            .secret(NAMESPACE, "orders-secret-orders-v1-shadow")
            .expect("shadow secret");
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert!(secret.metadata.uid.is_some(), "store assigned a fresh uid");
    }
}
