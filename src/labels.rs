// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label and annotation keys shared with the rest of the mesh.
//!
//! These strings are a wire contract with the sidecar, the control plane and any tooling
//! that inspects shadow workloads. They must be reproduced verbatim.

// ============================================================================
// Labels
// ============================================================================

/// Label marking a workload (and its ConfigMaps/Secrets) as a shadow copy
pub const SHADOW_SERVICE_LABEL: &str = "mesh.megaease.com/shadow-service";

/// Value of [`SHADOW_SERVICE_LABEL`] on shadow objects
pub const SHADOW_SERVICE_LABEL_VALUE: &str = "true";

/// Label selector string matching every shadow object
pub const SHADOW_SERVICE_SELECTOR: &str = "mesh.megaease.com/shadow-service=true";

// ============================================================================
// Annotations
// ============================================================================

/// Reverse link from a shadow workload to the `ShadowService` that owns it
pub const SHADOW_SERVICE_NAME_ANNOTATION: &str = "mesh.megaease.com/shadow-service-name";

/// Comma-joined `namespace/name` list of shadow ConfigMaps owned by a shadow workload
pub const SHADOW_CONFIGMAPS_ANNOTATION: &str = "mesh.megaease.com/shadow-configmaps";

/// Comma-joined `namespace/name` list of shadow Secrets owned by a shadow workload
pub const SHADOW_SECRETS_ANNOTATION: &str = "mesh.megaease.com/shadow-secrets";

/// Optional override naming the container that receives shadow environment variables
pub const APP_CONTAINER_NAME_ANNOTATION: &str = "mesh.megaease.com/app-container-name";

/// Mesh service a workload serves; what the searcher matches against
pub const SERVICE_NAME_ANNOTATION: &str = "mesh.megaease.com/service-name";

/// Instance labels the sidecar registers with the control plane
pub const SERVICE_LABELS_ANNOTATION: &str = "mesh.megaease.com/service-labels";

/// SHA-256 of the shadow workload's desired spec, used to skip no-op updates
pub const SHADOW_SPEC_HASH_ANNOTATION: &str = "mesh.megaease.com/shadow-spec-hash";
