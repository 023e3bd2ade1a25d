// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pagination helpers for list operations.
//!
//! Kubernetes lists are paged with `continue` tokens; Azure Resource Manager lists return a
//! `value` array plus an absolute `nextLink` URL. Both are drained into a single `Vec` here so
//! callers never see partial lists.

use crate::constants::{ARM_MAX_LIST_PAGES, KUBE_LIST_PAGE_SIZE};
use crate::dns_errors::DnsApiError;
use kube::{api::ListParams, Api, Resource};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::Debug;
use std::future::Future;
use tracing::debug;

/// One page of an ARM list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

/// List all Kubernetes resources with automatic pagination.
///
/// # Errors
///
/// Returns an error if Kubernetes API operations fail.
pub async fn list_all_paginated<K>(
    api: &Api<K>,
    mut list_params: ListParams,
) -> Result<Vec<K>, kube::Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    list_params.limit = Some(KUBE_LIST_PAGE_SIZE);

    let mut all_items = Vec::new();
    let mut page_count = 0;

    loop {
        page_count += 1;
        let result = api.list(&list_params).await?;

        let item_count = result.items.len();
        all_items.extend(result.items);

        debug!(
            page = page_count,
            items_in_page = item_count,
            total_items = all_items.len(),
            "Fetched page from Kubernetes API"
        );

        match result.metadata.continue_ {
            Some(token) if !token.is_empty() => list_params.continue_token = Some(token),
            _ => break,
        }
    }

    Ok(all_items)
}

/// Drain an ARM list by following `nextLink` until it is absent.
///
/// # Arguments
///
/// * `first_url` - URL of the first page
/// * `fetch_page` - Fetches and decodes one page given its absolute URL
///
/// # Errors
///
/// Returns the first page error, or `Decode` if the service keeps returning the same link
/// or exceeds the page limit.
pub async fn list_all_arm_pages<T, F, Fut>(
    first_url: String,
    mut fetch_page: F,
) -> Result<Vec<T>, DnsApiError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<ArmPage<T>, DnsApiError>>,
{
    let mut all_items = Vec::new();
    let mut next = Some(first_url);
    let mut page_count = 0;

    while let Some(url) = next.take() {
        page_count += 1;
        if page_count > ARM_MAX_LIST_PAGES {
            return Err(DnsApiError::Decode {
                message: format!("list exceeded {ARM_MAX_LIST_PAGES} pages"),
            });
        }

        let page = fetch_page(url.clone()).await?;
        let item_count = page.value.len();
        all_items.extend(page.value);

        debug!(
            page = page_count,
            items_in_page = item_count,
            total_items = all_items.len(),
            "Fetched page from Azure Resource Manager"
        );

        match page.next_link {
            Some(link) if link == url => {
                return Err(DnsApiError::Decode {
                    message: format!("nextLink repeats the current page: {link}"),
                });
            }
            Some(link) if !link.is_empty() => next = Some(link),
            _ => {}
        }
    }

    Ok(all_items)
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod pagination_tests;
