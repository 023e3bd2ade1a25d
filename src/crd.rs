// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed views of the Cluster API resources the operator consumes.
//!
//! The operator owns none of these resources. The structs declare only the fields the
//! reconcilers read; unknown fields are ignored on deserialization, so the views keep working
//! across upstream minor versions.
//!
//! # Resource Types
//!
//! - [`Cluster`] - The cluster-lifecycle record (`cluster.x-k8s.io`), source of the lifecycle
//!   phase and the control plane endpoint
//! - [`AzureCluster`] - The Azure infrastructure cluster, reconciled by this operator
//! - [`AzureClusterIdentity`] - The service principal used to talk to Azure
//!
//! # Example
//!
//! ```rust,no_run
//! use cluster_dns_operator::crd::AzureCluster;
//! use kube::{Api, Client};
//!
//! # async fn example(client: Client) -> Result<(), kube::Error> {
//! let clusters: Api<AzureCluster> = Api::namespaced(client, "org-acme");
//! let cluster = clusters.get("test-cluster").await?;
//! println!("resource group: {}", cluster.spec.resource_group);
//! # Ok(())
//! # }
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cluster API condition.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `Ready` or `LoadBalancersReady`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Returns true if the condition of `condition_type` is present with status `True`.
#[must_use]
pub fn condition_is_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.r#type == condition_type && c.status.eq_ignore_ascii_case("True"))
}

/// Host and port of a Kubernetes API endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: i32,
}

impl ApiEndpoint {
    /// Returns true if the endpoint carries no host.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.host.trim().is_empty()
    }
}

/// Reference to another object.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

// ============================================================================
// Cluster (cluster.x-k8s.io)
// ============================================================================

/// `Cluster` is the provider-agnostic cluster-lifecycle record.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced,
    doc = "Cluster API cluster record (consumed, not owned, by the DNS operator)."
)]
#[kube(status = "ClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub paused: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<ObjectReference>,
}

/// `Cluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Lifecycle phase, e.g. `Provisioning`, `Provisioned`, `Deleting`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default)]
    pub infrastructure_ready: bool,

    #[serde(default)]
    pub control_plane_ready: bool,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// AzureCluster (infrastructure.cluster.x-k8s.io)
// ============================================================================

/// `AzureCluster` is the Azure infrastructure of one cluster.
///
/// The operator reconciles DNS per `AzureCluster`; operator annotations such as
/// `cluster-dns-operator.io/bastion-ip` are read from its metadata.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureCluster",
    namespaced,
    doc = "Cluster API Azure infrastructure cluster (consumed, not owned, by the DNS operator)."
)]
#[kube(status = "AzureClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterSpec {
    #[serde(default)]
    pub resource_group: String,

    #[serde(default)]
    pub location: String,

    #[serde(default, rename = "subscriptionID")]
    pub subscription_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    /// Tags added to every Azure resource of the cluster.
    #[serde(default)]
    pub additional_tags: BTreeMap<String, String>,

    #[serde(default)]
    pub network_spec: NetworkSpec,
}

/// Network layout of an Azure cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    #[serde(default)]
    pub vnet: VnetSpec,

    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_lb: Option<LoadBalancerSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VnetSpec {
    /// Full resource id, set once the vnet exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    /// Defaults to the cluster resource group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub private_endpoints: Vec<PrivateEndpointSpec>,
}

/// A private endpoint placed in a subnet.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateEndpointSpec {
    pub name: String,

    #[serde(default, rename = "privateIPAddresses")]
    pub private_ip_addresses: Vec<String>,
}

/// API server load balancer.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `Public` or `Internal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// `AzureCluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

// ============================================================================
// AzureClusterIdentity (infrastructure.cluster.x-k8s.io)
// ============================================================================

/// `AzureClusterIdentity` names the service principal of a cluster.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureClusterIdentity",
    namespaced,
    doc = "Cluster API Azure identity (consumed, not owned, by the DNS operator)."
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterIdentitySpec {
    /// `ServicePrincipal`, `ManualServicePrincipal`, `WorkloadIdentity`, ...
    #[serde(default)]
    pub r#type: String,

    #[serde(default, rename = "tenantID")]
    pub tenant_id: String,

    #[serde(default, rename = "clientID")]
    pub client_id: String,

    /// Secret holding the client secret under key `clientSecret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SecretReference>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Identity types authenticated with a client secret.
pub const SECRET_IDENTITY_TYPES: [&str; 2] = ["ServicePrincipal", "ManualServicePrincipal"];

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
