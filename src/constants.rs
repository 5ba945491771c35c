// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the shadow service operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all mesh CRDs
pub const API_GROUP: &str = "mesh.megaease.com";

/// API version for all mesh CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "mesh.megaease.com/v1alpha1";

/// Kind name for `ShadowService` resource
pub const KIND_SHADOW_SERVICE: &str = "ShadowService";

/// Kind name for `ServiceCanary` resource
pub const KIND_SERVICE_CANARY: &str = "ServiceCanary";

/// Kind name for `MeshDeployment` resource
pub const KIND_MESH_DEPLOYMENT: &str = "MeshDeployment";

/// Kind name for the apps/v1 `Deployment`
pub const KIND_DEPLOYMENT: &str = "Deployment";

/// Kind name for `ConfigMap`
pub const KIND_CONFIG_MAP: &str = "ConfigMap";

/// Kind name for `Secret`
pub const KIND_SECRET: &str = "Secret";

// ============================================================================
// Mesh Scaffolding Constants
// ============================================================================

/// Name of the sidecar container injected by the mesh
pub const SIDECAR_CONTAINER_NAME: &str = "easemesh-sidecar";

/// Name of the init-container injected by the mesh
pub const AGENT_INITIALIZER_CONTAINER_NAME: &str = "easemesh-agent-initializer";

/// Volume shared between the initializer and the application (Java agent jars)
pub const AGENT_VOLUME_NAME: &str = "easemesh-agent-volume";

/// Volume carrying the sidecar's startup parameters
pub const SIDECAR_PARAMS_VOLUME_NAME: &str = "easemesh-sidecar-params-volume";

/// Volumes the mesh injects on its own; stripped from shadow templates
pub const MESH_INJECTED_VOLUMES: [&str; 2] = [AGENT_VOLUME_NAME, SIDECAR_PARAMS_VOLUME_NAME];

// ============================================================================
// Shadow Naming Constants
// ============================================================================

/// Suffix appended to a source workload name to form its shadow name
pub const SHADOW_NAME_SUFFIX: &str = "shadow";

// ============================================================================
// Canary Constants
// ============================================================================

/// Name of the cluster-wide `ServiceCanary` singleton
pub const SHADOW_SERVICE_CANARY_NAME: &str = "shadow-service-canary";

/// Instance label key used by the canary selector
pub const CANARY_NAME_LABEL_KEY: &str = "canary-name";

/// Instance label value identifying shadow instances
pub const CANARY_NAME_LABEL_VALUE: &str = "shadow";

/// Request header that marks shadow traffic
pub const SHADOW_TRAFFIC_HEADER: &str = "X-Mesh-Shadow";

/// Value of [`SHADOW_TRAFFIC_HEADER`] carried by shadow requests
pub const SHADOW_TRAFFIC_HEADER_VALUE: &str = "shadow";

/// Priority assigned to the shadow canary rule
pub const SHADOW_CANARY_PRIORITY: i32 = 5;

// ============================================================================
// Shadow Resource Environment Variables
// ============================================================================

/// Environment variable carrying the shadow MySQL configuration
pub const ENV_RESOURCE_DATABASE: &str = "EASE_RESOURCE_DATABASE";

/// Environment variable carrying the shadow Redis configuration
pub const ENV_RESOURCE_REDIS: &str = "EASE_RESOURCE_REDIS";

/// Environment variable carrying the shadow Kafka configuration
pub const ENV_RESOURCE_KAFKA: &str = "EASE_RESOURCE_KAFKA";

/// Environment variable carrying the shadow RabbitMQ configuration
pub const ENV_RESOURCE_RABBITMQ: &str = "EASE_RESOURCE_RABBITMQ";

/// Environment variable carrying the shadow Elasticsearch configuration
pub const ENV_RESOURCE_ELASTICSEARCH: &str = "EASE_RESOURCE_ELASTICSEARCH";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Default interval between reconciliation passes (30 seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 30;

/// Default deadline for a single resource store call (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent clone and delete workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default number of attempts for a `ServiceCanary` read-modify-write
pub const DEFAULT_CANARY_RETRIES: u32 = 5;

/// Capacity of the clone and delete work queues
pub const WORK_QUEUE_CAPACITY: usize = 64;

/// Attempts made to list `ShadowService` objects at the start of a pass
pub const LIST_RETRY_ATTEMPTS: u32 = 3;

/// Page size for Kubernetes list calls
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the metrics HTTP server
pub const DEFAULT_METRICS_ADDRESS: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";
