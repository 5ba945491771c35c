// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Chunked list calls.
//!
//! A resync pass lists every labelled workload in every namespace. Asking the API
//! server for `KUBE_LIST_PAGE_SIZE` objects at a time keeps each response small
//! enough that a crowded namespace cannot stall the pass on a single huge body.

use crate::constants::KUBE_LIST_PAGE_SIZE;
use kube::{api::ListParams, Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Follow `continue` tokens until the server reports the last chunk.
///
/// Label and field selectors on `params` are preserved for every chunk.
///
/// # Errors
///
/// Fails on the first chunk the API server rejects; objects from earlier
/// chunks are discarded.
pub async fn list_all_paginated<K>(api: &Api<K>, params: ListParams) -> Result<Vec<K>, kube::Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let mut params = params.limit(KUBE_LIST_PAGE_SIZE);
    let mut items = Vec::new();
    let mut chunks = 0_usize;

    loop {
        let chunk = api.list(&params).await?;
        chunks += 1;
        items.extend(chunk.items);

        let Some(token) = chunk.metadata.continue_.filter(|t| !t.is_empty()) else {
            break;
        };
        params.continue_token = Some(token);
    }

    debug!(
        kind = %K::kind(&()),
        chunks,
        items = items.len(),
        "Listed objects"
    );
    Ok(items)
}
