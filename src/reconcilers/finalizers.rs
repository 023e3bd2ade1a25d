// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for namespaced Kubernetes resources.
//!
//! The DNS operator places one finalizer on every infrastructure cluster before it first
//! mutates DNS, and removes it once all zones of the cluster have been torn down.
//!
//! # Example
//!
//! ```rust,no_run
//! use cluster_dns_operator::crd::AzureCluster;
//! use cluster_dns_operator::labels::FINALIZER_DNS_RECORDS;
//! use cluster_dns_operator::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
//! use kube::Client;
//!
//! async fn reconcile(client: Client, cluster: AzureCluster) -> Result<(), kube::Error> {
//!     if cluster.metadata.deletion_timestamp.is_some() {
//!         // tear down DNS, then
//!         return remove_finalizer(&client, &cluster, FINALIZER_DNS_RECORDS).await;
//!     }
//!     ensure_finalizer(&client, &cluster, FINALIZER_DNS_RECORDS).await
//! }
//! ```

use crate::reconcilers::retry::{default_backoff, retry_api_call};
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::{json, Value};
use tracing::info;

/// Returns true if `finalizer` is present on the resource.
#[must_use]
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Finalizer list of the resource with `finalizer` appended, or `None` if already present.
#[must_use]
pub fn finalizers_with<T: Resource>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if has_finalizer(resource, finalizer) {
        return None;
    }
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// Finalizer list of the resource without `finalizer`, or `None` if absent.
#[must_use]
pub fn finalizers_without<T: Resource>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if !has_finalizer(resource, finalizer) {
        return None;
    }
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.retain(|f| f != finalizer);
    Some(finalizers)
}

/// Merge patch replacing the finalizer list, pinned to the resource version it was computed from.
///
/// Other controllers edit the same list, so a patch built from a stale copy is refused by the
/// API server with a conflict instead of overwriting their finalizers.
#[must_use]
pub fn finalizer_patch<T: Resource>(resource: &T, finalizers: &[String]) -> Value {
    match resource.meta().resource_version.as_deref() {
        Some(version) => json!({
            "metadata": { "finalizers": finalizers, "resourceVersion": version }
        }),
        None => json!({ "metadata": { "finalizers": finalizers } }),
    }
}

async fn patch_finalizers<T>(
    client: &Client,
    resource: &T,
    finalizers: Vec<String>,
) -> Result<(), kube::Error>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let name = resource.name_any();
    let params = PatchParams::default();
    let patch = Patch::Merge(finalizer_patch(resource, &finalizers));
    retry_api_call(
        default_backoff(),
        || api.patch(&name, &params, &patch),
        "PatchFinalizers",
    )
    .await?;
    Ok(())
}

/// Add a finalizer to a resource if not already present.
///
/// Idempotent: a resource already carrying the finalizer is not patched.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(
    client: &Client,
    resource: &T,
    finalizer: &str,
) -> Result<(), kube::Error>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if let Some(finalizers) = finalizers_with(resource, finalizer) {
        info!(
            "Adding finalizer {} to {}/{} {}",
            finalizer,
            resource.namespace().unwrap_or_default(),
            resource.name_any(),
            T::kind(&())
        );
        patch_finalizers(client, resource, finalizers).await?;
    }
    Ok(())
}

/// Remove a finalizer from a resource.
///
/// Idempotent: a resource without the finalizer is not patched.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(
    client: &Client,
    resource: &T,
    finalizer: &str,
) -> Result<(), kube::Error>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if let Some(finalizers) = finalizers_without(resource, finalizer) {
        info!(
            "Removing finalizer {} from {}/{} {}",
            finalizer,
            resource.namespace().unwrap_or_default(),
            resource.name_any(),
            T::kind(&())
        );
        patch_finalizers(client, resource, finalizers).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
