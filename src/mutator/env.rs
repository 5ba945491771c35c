// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Environment synthesis for the shadow application container.
//!
//! Each configured shadow resource becomes one `EASE_RESOURCE_*` variable holding its
//! configuration as single-line JSON. User `envs` follow; string values are exported as
//! they are and anything else is JSON-encoded. A user entry with the same name as a
//! resource variable wins. The result is sorted by name so the same configuration always
//! yields the same pod template.

use crate::constants::{
    ENV_RESOURCE_DATABASE, ENV_RESOURCE_ELASTICSEARCH, ENV_RESOURCE_KAFKA, ENV_RESOURCE_RABBITMQ,
    ENV_RESOURCE_REDIS,
};
use crate::crd::ShadowResourceConfig;
use crate::errors::ShadowError;
use k8s_openapi::api::core::v1::EnvVar;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

fn encode<T: Serialize>(what: &str, value: &T) -> Result<String, ShadowError> {
    serde_json::to_string(value).map_err(|source| ShadowError::Serialization {
        what: what.to_string(),
        source,
    })
}

fn insert_resource<T: Serialize>(
    vars: &mut BTreeMap<String, String>,
    name: &str,
    config: Option<&T>,
) -> Result<(), ShadowError> {
    if let Some(config) = config {
        vars.insert(name.to_string(), encode(name, config)?);
    }
    Ok(())
}

/// Build the environment variables for a shadow resource configuration.
///
/// # Errors
///
/// Returns [`ShadowError::Serialization`] if a value cannot be encoded as JSON.
pub fn shadow_env_vars(config: &ShadowResourceConfig) -> Result<Vec<EnvVar>, ShadowError> {
    let mut vars = BTreeMap::new();
    insert_resource(&mut vars, ENV_RESOURCE_DATABASE, config.mysql.as_ref())?;
    insert_resource(&mut vars, ENV_RESOURCE_REDIS, config.redis.as_ref())?;
    insert_resource(&mut vars, ENV_RESOURCE_KAFKA, config.kafka.as_ref())?;
    insert_resource(&mut vars, ENV_RESOURCE_RABBITMQ, config.rabbitmq.as_ref())?;
    insert_resource(&mut vars, ENV_RESOURCE_ELASTICSEARCH, config.elasticsearch.as_ref())?;

    for (name, value) in &config.envs {
        let rendered = match value {
            Value::Null => continue,
            Value::String(text) => text.clone(),
            other => encode(name, other)?,
        };
        vars.insert(name.clone(), rendered);
    }

    Ok(vars
        .into_iter()
        .map(|(name, value)| EnvVar {
            name,
            value: Some(value),
            ..Default::default()
        })
        .collect())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod env_tests;
