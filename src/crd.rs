// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for shadow service management.
//!
//! # Resource Types
//!
//! - [`ShadowService`] - Declares which mesh service to mirror and which shadow backing
//!   resources (database, cache, queue, search) the mirror should use
//! - [`ServiceCanary`] - Cluster-scoped traffic rule steering shadow-tagged requests to
//!   shadow instances
//! - [`MeshDeployment`] - The mesh's own deployment variant, mirrored exactly like an
//!   apps/v1 `Deployment`
//!
//! # Example: Declaring a Shadow Service
//!
//! ```rust
//! use shadow_operator::crd::{MySqlConfig, ShadowConfigMap, ShadowResourceConfig, ShadowServiceSpec};
//!
//! let spec = ShadowServiceSpec {
//!     service_name: "orders-v1".to_string(),
//!     config_maps: vec![ShadowConfigMap {
//!         name: "orders-cfg".to_string(),
//!         data: None,
//!     }],
//!     secrets: vec![],
//!     resource_config: ShadowResourceConfig {
//!         mysql: Some(MySqlConfig {
//!             hosts: vec!["db:3306".to_string()],
//!             ..Default::default()
//!         }),
//!         ..Default::default()
//!     },
//! };
//! ```

use k8s_openapi::api::apps::v1::DeploymentSpec;
use kube::{CustomResource, ResourceExt};
use schemars::{json_schema, JsonSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `ShadowService` declares the intent to mirror a live mesh service.
///
/// The operator finds the workload serving `serviceName` in the same namespace, clones it
/// as `<workload>-shadow`, points the clone at the shadow resources configured here, and
/// registers the service with the shadow `ServiceCanary`.
///
/// # Example
///
/// ```yaml
/// apiVersion: mesh.megaease.com/v1alpha1
/// kind: ShadowService
/// metadata:
///   name: orders-shadow
///   namespace: shop
/// spec:
///   serviceName: orders-v1
///   configMaps:
///     - name: orders-cfg
///   resourceConfig:
///     mysql:
///       hosts: ["db:3306"]
/// ```
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "mesh.megaease.com",
    version = "v1alpha1",
    kind = "ShadowService",
    derive = "PartialEq",
    namespaced,
    shortname = "shadowsvc",
    printcolumn = r#"{"name":"Service","type":"string","jsonPath":".spec.serviceName"}"#,
    doc = "ShadowService declares a traffic-mirrored copy of a mesh service that runs against shadow backing resources."
)]
#[serde(rename_all = "camelCase")]
pub struct ShadowServiceSpec {
    /// Mesh service whose workload is mirrored.
    ///
    /// Matched against the `mesh.megaease.com/service-name` annotation of workloads in the
    /// same namespace.
    pub service_name: String,

    /// ConfigMaps cloned alongside the shadow workload, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_maps: Vec<ShadowConfigMap>,

    /// Secrets cloned alongside the shadow workload, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<ShadowSecret>,

    /// Shadow backing resources and extra environment for the application container.
    #[serde(default)]
    pub resource_config: ShadowResourceConfig,
}

impl ShadowService {
    /// Lookup key `<namespace>/<name>`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }
}

/// A ConfigMap to clone for the shadow workload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShadowConfigMap {
    /// Name of the source ConfigMap in the shadow service's namespace.
    pub name: String,

    /// Data for the shadow copy. When absent, the source ConfigMap's data is copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
}

/// A Secret to clone for the shadow workload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShadowSecret {
    /// Name of the source Secret in the shadow service's namespace.
    pub name: String,

    /// Plain-text data for the shadow copy. When absent, the source Secret's data is copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_data: Option<BTreeMap<String, String>>,
}

/// Shadow backing resources.
///
/// Every resource is optional; an absent resource produces no environment variable.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShadowResourceConfig {
    /// Shadow MySQL, exported as `EASE_RESOURCE_DATABASE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<MySqlConfig>,

    /// Shadow Redis, exported as `EASE_RESOURCE_REDIS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,

    /// Shadow Kafka, exported as `EASE_RESOURCE_KAFKA`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka: Option<KafkaConfig>,

    /// Shadow RabbitMQ, exported as `EASE_RESOURCE_RABBITMQ`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rabbitmq: Option<RabbitMqConfig>,

    /// Shadow Elasticsearch, exported as `EASE_RESOURCE_ELASTICSEARCH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<ElasticsearchConfig>,

    /// Extra environment variables. Strings are exported verbatim, any other value as
    /// single-line JSON.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(schema_with = "free_form_map")]
    pub envs: BTreeMap<String, serde_json::Value>,
}

/// Shadow MySQL connection settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MySqlConfig {
    /// `host:port` endpoints.
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// Shadow Redis connection settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedisConfig {
    /// `host:port` endpoints.
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<i64>,
}

/// Shadow Kafka connection settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KafkaConfig {
    /// Bootstrap brokers, `host:port`.
    pub bootstrap_servers: Vec<String>,
}

/// Shadow RabbitMQ connection settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMqConfig {
    /// `amqp://` URIs.
    pub uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Shadow Elasticsearch connection settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchConfig {
    /// HTTP endpoints.
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn free_form_map(_: &mut schemars::generate::SchemaGenerator) -> schemars::Schema {
    json_schema!({
        "type": "object",
        "additionalProperties": {
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}

/// `ServiceCanary` steers requests matching its traffic rules to the instances its
/// selector picks.
///
/// The operator owns exactly one of these, `shadow-service-canary`, whose
/// `matchServices` lists every service with an active `ShadowService`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "mesh.megaease.com",
    version = "v1alpha1",
    kind = "ServiceCanary",
    derive = "PartialEq",
    doc = "ServiceCanary routes requests carrying the configured headers to the selected service instances."
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCanarySpec {
    /// Evaluation order among canaries; lower runs first.
    #[serde(default)]
    pub priority: i32,

    /// Which services and instances receive the matched traffic.
    pub selector: ServiceSelector,

    /// Which requests are matched.
    pub traffic_rules: TrafficRules,
}

/// Service and instance selection for a `ServiceCanary`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSelector {
    #[serde(default)]
    pub match_services: Vec<String>,
    #[serde(default)]
    pub match_instance_labels: BTreeMap<String, String>,
}

/// Request matching rules for a `ServiceCanary`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRules {
    #[serde(default)]
    pub headers: BTreeMap<String, StringMatch>,
}

/// Match on a header value. Exactly one field is expected to be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StringMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// `MeshDeployment` is the mesh's deployment variant: a deployment spec plus the mesh
/// service it registers as.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "mesh.megaease.com",
    version = "v1alpha1",
    kind = "MeshDeployment",
    derive = "PartialEq",
    namespaced,
    doc = "MeshDeployment deploys a workload registered as a mesh service."
)]
#[serde(rename_all = "camelCase")]
pub struct MeshDeploymentSpec {
    /// Mesh service identity.
    pub service: MeshServiceRef,

    /// The wrapped deployment.
    pub deploy: DeploymentSpec,
}

/// Mesh service identity carried by a `MeshDeployment`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeshServiceRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
