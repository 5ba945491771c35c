// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Writes the CustomResourceDefinition manifests for every custom resource the
//! operator reads or writes.
//!
//! ```text
//! cargo run --bin crdgen [output-dir]   # defaults to deploy/crds
//! ```

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use shadow_operator::crd::{MeshDeployment, ServiceCanary, ShadowService};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT_DIR: &str = "deploy/crds";

const HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# Generated by `cargo run --bin crdgen` from src/crd.rs. Do not edit.
#
";

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR), PathBuf::from);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let written = [
        write_crd::<ShadowService>(&dir, "shadowservices.crd.yaml")?,
        write_crd::<ServiceCanary>(&dir, "servicecanaries.crd.yaml")?,
        write_crd::<MeshDeployment>(&dir, "meshdeployments.crd.yaml")?,
    ];

    for path in &written {
        println!("wrote {}", path.display());
    }
    println!("apply with: kubectl apply -f {}", dir.display());
    Ok(())
}

fn write_crd<T: CustomResourceExt>(dir: &Path, file: &str) -> Result<PathBuf> {
    let body = serde_yaml::to_string(&T::crd())
        .with_context(|| format!("rendering {}", T::crd_name()))?;
    let path = dir.join(file);
    fs::write(&path, format!("{HEADER}{body}"))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
