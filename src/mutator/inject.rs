// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Order-preserving merge of pod-spec lists.
//!
//! Containers, volumes, environment variables and ports are all lists of items keyed by a
//! name. Injecting an item replaces the existing item with the same key in place, or
//! appends it when the key is new. Injecting the same items twice is a no-op.
//!
//! [`inject_by_name`] covers the kinds the mutator rewrites. Lists keyed some other way,
//! such as ports keyed by name or number, go through [`inject_by_key`].

use k8s_openapi::api::core::v1::{Container, EnvVar, Volume};

/// An item that can be merged by name.
pub trait Named {
    /// Key the item is merged on.
    fn merge_key(&self) -> String;
}

impl Named for Container {
    fn merge_key(&self) -> String {
        self.name.clone()
    }
}

impl Named for Volume {
    fn merge_key(&self) -> String {
        self.name.clone()
    }
}

impl Named for EnvVar {
    fn merge_key(&self) -> String {
        self.name.clone()
    }
}

/// Upsert `injected` into `existing`, matching items by `key`.
pub fn inject_by_key<T, K, F>(existing: &mut Vec<T>, injected: impl IntoIterator<Item = T>, key: F)
where
    F: Fn(&T) -> K,
    K: PartialEq,
{
    for item in injected {
        let item_key = key(&item);
        match existing.iter().position(|current| key(current) == item_key) {
            Some(index) => existing[index] = item,
            None => existing.push(item),
        }
    }
}

/// Upsert `injected` into `existing`, matching items by [`Named::merge_key`].
pub fn inject_by_name<T: Named>(existing: &mut Vec<T>, injected: impl IntoIterator<Item = T>) {
    inject_by_key(existing, injected, Named::merge_key);
}

/// Remove every item whose key is in `names`.
pub fn remove_by_name<T: Named>(existing: &mut Vec<T>, names: &[&str]) {
    existing.retain(|item| !names.contains(&item.merge_key().as_str()));
}

#[cfg(test)]
#[path = "inject_tests.rs"]
mod inject_tests;
