// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn test_shadow_service_deserializes_camel_case() {
        let value = json!({
            "serviceName": "orders-v1",
            "configMaps": [{"name": "orders-cfg"}],
            "secrets": [{"name": "orders-secret", "stringData": {"password": "shadow"}}],
            "resourceConfig": {
                "mysql": {"hosts": ["db:3306"], "userName": "shadow"},
                "kafka": {"bootstrapServers": ["kafka:9092"]},
                "envs": {"FEATURE_FLAG": true}
            }
        });

        let spec: ShadowServiceSpec = serde_json::from_value(value).expect("valid spec");

        assert_eq!(spec.service_name, "orders-v1");
        assert_eq!(spec.config_maps[0].name, "orders-cfg");
        assert!(spec.config_maps[0].data.is_none());
        assert_eq!(
            spec.secrets[0]
                .string_data
                .as_ref()
                .and_then(|d| d.get("password"))
                .map(String::as_str),
            Some("shadow")
        );
        let mysql = spec.resource_config.mysql.expect("mysql configured");
        assert_eq!(mysql.user_name.as_deref(), Some("shadow"));
        assert!(spec.resource_config.redis.is_none());
        assert_eq!(
            spec.resource_config.kafka.map(|k| k.bootstrap_servers),
            Some(vec!["kafka:9092".to_string()])
        );
        assert_eq!(spec.resource_config.envs["FEATURE_FLAG"], json!(true));
    }

    #[test]
    fn test_minimal_shadow_service_defaults() {
        let spec: ShadowServiceSpec =
            serde_json::from_value(json!({"serviceName": "orders-v1"})).expect("valid spec");

        assert!(spec.config_maps.is_empty());
        assert!(spec.secrets.is_empty());
        assert_eq!(spec.resource_config, ShadowResourceConfig::default());
    }

    #[test]
    fn test_mysql_config_omits_unset_fields() {
        let config = MySqlConfig {
            hosts: vec!["db:3306".to_string()],
            ..Default::default()
        };

        let encoded = serde_json::to_string(&config).expect("serializable");

        assert_eq!(encoded, r#"{"hosts":["db:3306"]}"#);
    }

    #[test]
    fn test_shadow_service_key() {
        let mut svc = ShadowService::new(
            "orders-shadow",
            ShadowServiceSpec {
                service_name: "orders-v1".to_string(),
                config_maps: vec![],
                secrets: vec![],
                resource_config: ShadowResourceConfig::default(),
            },
        );
        svc.metadata.namespace = Some("shop".to_string());

        assert_eq!(svc.key(), "shop/orders-shadow");
    }

    #[test]
    fn test_crd_scopes() {
        assert_eq!(ShadowService::crd().spec.scope, "Namespaced");
        assert_eq!(MeshDeployment::crd().spec.scope, "Namespaced");
        assert_eq!(
            ServiceCanary::crd().spec.scope,
            "Cluster",
            "the shadow canary is a cluster-wide singleton"
        );
        assert_eq!(ShadowService::crd().spec.group, "mesh.megaease.com");
    }

    #[test]
    fn test_service_canary_spec_serialization() {
        let spec = ServiceCanarySpec {
            priority: 5,
            selector: ServiceSelector {
                match_services: vec!["orders".to_string()],
                match_instance_labels: [("canary-name".to_string(), "shadow".to_string())]
                    .into_iter()
                    .collect(),
            },
            traffic_rules: TrafficRules {
                headers: [(
                    "X-Mesh-Shadow".to_string(),
                    StringMatch {
                        exact: Some("shadow".to_string()),
                        ..Default::default()
                    },
                )]
                .into_iter()
                .collect(),
            },
        };

        let value = serde_json::to_value(&spec).expect("serializable");

        assert_eq!(
            value,
            json!({
                "priority": 5,
                "selector": {
                    "matchServices": ["orders"],
                    "matchInstanceLabels": {"canary-name": "shadow"}
                },
                "trafficRules": {
                    "headers": {"X-Mesh-Shadow": {"exact": "shadow"}}
                }
            })
        );
    }
}
