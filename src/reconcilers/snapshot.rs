// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster snapshot: the immutable per-reconcile view of every input DNS depends on.
//!
//! [`build_snapshot`] is the single adapter from the typed Cluster API records to
//! [`ClusterSnapshot`]. It is pure; [`load_snapshot`] does the I/O (identity lookups, secret
//! reads, endpoint resolution) and then calls it. [`load_deletion_snapshot`] does the same for a
//! deleted cluster, where an endpoint that no longer resolves simply has no address.
//!
//! # Precedence
//!
//! - `private_api_ip`: the `private-api-ip` annotation wins; otherwise the first IPv4 of the
//!   management cluster private endpoint named `<cluster>-api-privatelink-privateendpoint`
//! - `api_endpoint`: the infrastructure cluster's control plane endpoint, then the `Cluster`'s
//! - `bastion_ip`: only from the `bastion-ip` annotation

use crate::azure::CloudIdentity;
use crate::config::OperatorConfig;
use crate::constants::{
    API_SERVER_LB_TYPE_INTERNAL, CLIENT_SECRET_KEY, PRIVATE_LINK_ENDPOINT_SUFFIX,
};
use crate::crd::{AzureCluster, AzureClusterIdentity, Cluster, SECRET_IDENTITY_TYPES};
use crate::dns_errors::{DnsApiError, ReconcileError};
use crate::labels::{
    BASTION_IP_ANNOTATION, CLUSTER_NAME_LABEL, CLUSTER_OWNED_TAG_PREFIX,
    CLUSTER_OWNED_TAG_VALUE, PRIVATE_API_IP_ANNOTATION, PRIVATE_INGRESS_IP_ANNOTATION,
};
use crate::reconcilers::retry::{default_backoff, retry_api_call};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Whether the workload API is reachable from the Internet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointVisibility {
    Public,
    Private,
}

/// A private endpoint of the management cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateEndpoint {
    pub name: String,
    pub private_ips: Vec<String>,
}

/// The management cluster as far as private zones need it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagementCluster {
    pub name: String,
    pub namespace: String,
    pub resource_group: String,
    pub virtual_network_id: Option<String>,
    pub identity: CloudIdentity,
    pub private_endpoints: Vec<PrivateEndpoint>,
}

impl ManagementCluster {
    /// Build the management-cluster view from its infrastructure cluster and identity.
    #[must_use]
    pub fn from_azure_cluster(cluster: &AzureCluster, identity: CloudIdentity) -> Self {
        Self {
            name: cluster_name(cluster),
            namespace: cluster.namespace().unwrap_or_default(),
            resource_group: cluster.spec.resource_group.clone(),
            virtual_network_id: virtual_network_id(cluster),
            identity,
            private_endpoints: cluster
                .spec
                .network_spec
                .subnets
                .iter()
                .flat_map(|subnet| subnet.private_endpoints.iter())
                .map(|endpoint| PrivateEndpoint {
                    name: endpoint.name.clone(),
                    private_ips: endpoint.private_ip_addresses.clone(),
                })
                .collect(),
        }
    }

    /// First private IPv4 of the endpoint exposing `cluster`'s API.
    #[must_use]
    pub fn private_link_ip(&self, cluster: &str) -> Option<Ipv4Addr> {
        let wanted = format!("{cluster}{PRIVATE_LINK_ENDPOINT_SUFFIX}");
        self.private_endpoints
            .iter()
            .find(|endpoint| endpoint.name == wanted)
            .and_then(|endpoint| {
                endpoint
                    .private_ips
                    .iter()
                    .find_map(|ip| ip.trim().parse::<Ipv4Addr>().ok())
            })
    }
}

/// Immutable inputs of one reconcile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub cluster_name: String,
    pub namespace: String,
    pub base_domain: String,
    pub location: String,
    pub resource_group: String,
    pub api_endpoint: Option<Ipv4Addr>,
    pub api_endpoint_visibility: EndpointVisibility,
    pub bastion_ip: Option<Ipv4Addr>,
    pub private_api_ip: Option<Ipv4Addr>,
    pub private_ingress_ip: Option<Ipv4Addr>,
    pub virtual_network_id: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub identity: CloudIdentity,
    pub management_cluster: Option<ManagementCluster>,
}

impl ClusterSnapshot {
    /// FQDN of the per-cluster zone.
    #[must_use]
    pub fn zone_fqdn(&self) -> String {
        format!("{}.{}", self.cluster_name, self.base_domain)
    }

    /// The management cluster, unless this cluster is the management cluster.
    #[must_use]
    pub fn remote_management_cluster(&self) -> Option<&ManagementCluster> {
        self.management_cluster.as_ref().filter(|mc| {
            !(mc.name == self.cluster_name && mc.namespace == self.namespace)
        })
    }
}

/// Everything [`build_snapshot`] reads.
#[derive(Clone, Debug)]
pub struct SnapshotInputs<'a> {
    pub infra: &'a AzureCluster,
    pub cluster: Option<&'a Cluster>,
    pub identity: CloudIdentity,
    /// The API endpoint host resolved to IPv4, when it was not a literal address
    pub resolved_endpoint: Option<Ipv4Addr>,
    pub management_cluster: Option<ManagementCluster>,
    pub base_domain: &'a str,
}

/// Name of the cluster an infrastructure cluster belongs to.
#[must_use]
pub fn cluster_name(infra: &AzureCluster) -> String {
    infra
        .labels()
        .get(CLUSTER_NAME_LABEL)
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| infra.name_any())
}

/// Control plane endpoint host, preferring the infrastructure cluster's.
#[must_use]
pub fn endpoint_host(infra: &AzureCluster, cluster: Option<&Cluster>) -> Option<String> {
    infra
        .spec
        .control_plane_endpoint
        .as_ref()
        .filter(|endpoint| !endpoint.is_empty())
        .or_else(|| {
            cluster
                .and_then(|c| c.spec.control_plane_endpoint.as_ref())
                .filter(|endpoint| !endpoint.is_empty())
        })
        .map(|endpoint| endpoint.host.trim().to_string())
}

/// Full resource id of the cluster's virtual network.
#[must_use]
pub fn virtual_network_id(infra: &AzureCluster) -> Option<String> {
    let vnet = &infra.spec.network_spec.vnet;
    if let Some(id) = vnet.id.as_ref().filter(|id| !id.is_empty()) {
        return Some(id.clone());
    }
    if vnet.name.is_empty() || infra.spec.subscription_id.is_empty() {
        return None;
    }
    let resource_group = vnet
        .resource_group
        .as_deref()
        .filter(|rg| !rg.is_empty())
        .unwrap_or(&infra.spec.resource_group);
    Some(format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}",
        infra.spec.subscription_id, resource_group, vnet.name
    ))
}

/// Parse an optional IPv4 annotation; empty values count as absent.
///
/// # Errors
///
/// Returns `InvalidConfig` for values that are not IPv4 addresses.
pub fn ip_annotation(
    annotations: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<Ipv4Addr>, ReconcileError> {
    match annotations.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            ReconcileError::InvalidConfig(format!(
                "annotation {key}={value} is not an IPv4 address"
            ))
        }),
    }
}

fn internal_load_balancer(infra: &AzureCluster) -> bool {
    infra
        .spec
        .network_spec
        .api_server_lb
        .as_ref()
        .and_then(|lb| lb.r#type.as_deref())
        .is_some_and(|t| t.eq_ignore_ascii_case(API_SERVER_LB_TYPE_INTERNAL))
}

/// Build the snapshot of one cluster.
///
/// # Errors
///
/// Returns `InvalidConfig` when required fields are missing or annotations are malformed.
pub fn build_snapshot(inputs: SnapshotInputs<'_>) -> Result<ClusterSnapshot, ReconcileError> {
    let infra = inputs.infra;
    let name = cluster_name(infra);
    let annotations = infra.annotations();

    if inputs.base_domain.is_empty() {
        return Err(ReconcileError::InvalidConfig("base domain is empty".to_string()));
    }
    if infra.spec.resource_group.is_empty() {
        return Err(ReconcileError::InvalidConfig(format!(
            "AzureCluster {name} has no resource group"
        )));
    }

    let api_endpoint = match endpoint_host(infra, inputs.cluster) {
        Some(host) => match host.parse::<Ipv4Addr>() {
            Ok(ip) => Some(ip),
            Err(_) => inputs.resolved_endpoint,
        },
        None => None,
    };
    let api_endpoint_visibility =
        if internal_load_balancer(infra) || api_endpoint.is_some_and(|ip| ip.is_private()) {
            EndpointVisibility::Private
        } else {
            EndpointVisibility::Public
        };

    let private_api_ip = match ip_annotation(annotations, PRIVATE_API_IP_ANNOTATION)? {
        Some(ip) => Some(ip),
        None => inputs
            .management_cluster
            .as_ref()
            .and_then(|mc| mc.private_link_ip(&name)),
    };

    let mut tags = infra.spec.additional_tags.clone();
    tags.insert(
        format!("{CLUSTER_OWNED_TAG_PREFIX}{name}"),
        CLUSTER_OWNED_TAG_VALUE.to_string(),
    );

    Ok(ClusterSnapshot {
        namespace: infra.namespace().unwrap_or_default(),
        base_domain: inputs.base_domain.to_string(),
        location: infra.spec.location.clone(),
        resource_group: infra.spec.resource_group.clone(),
        api_endpoint,
        api_endpoint_visibility,
        bastion_ip: ip_annotation(annotations, BASTION_IP_ANNOTATION)?,
        private_api_ip,
        private_ingress_ip: ip_annotation(annotations, PRIVATE_INGRESS_IP_ANNOTATION)?,
        virtual_network_id: virtual_network_id(infra),
        tags,
        identity: inputs.identity,
        management_cluster: inputs.management_cluster,
        cluster_name: name,
    })
}

/// Build a [`CloudIdentity`] from an identity record and its client secret.
///
/// # Errors
///
/// Returns `InvalidConfig` for identity types without a client secret, or a secret missing
/// the `clientSecret` key.
pub fn identity_from(
    identity: &AzureClusterIdentity,
    secret: &Secret,
    subscription_id: &str,
) -> Result<CloudIdentity, ReconcileError> {
    let name = identity.name_any();
    let client_secret = secret
        .data
        .as_ref()
        .and_then(|data| data.get(CLIENT_SECRET_KEY))
        .map(|bytes| String::from_utf8(bytes.0.clone()))
        .transpose()
        .map_err(|_| {
            ReconcileError::InvalidConfig(format!(
                "secret {} key {CLIENT_SECRET_KEY} is not UTF-8",
                secret.name_any()
            ))
        })?
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(CLIENT_SECRET_KEY))
                .cloned()
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ReconcileError::InvalidConfig(format!(
                "secret {} of identity {name} has no {CLIENT_SECRET_KEY}",
                secret.name_any()
            ))
        })?;

    if identity.spec.tenant_id.is_empty() || identity.spec.client_id.is_empty() {
        return Err(ReconcileError::InvalidConfig(format!(
            "AzureClusterIdentity {name} has no tenantID or clientID"
        )));
    }
    if subscription_id.is_empty() {
        return Err(ReconcileError::InvalidConfig(format!(
            "no subscription id for identity {name}"
        )));
    }

    Ok(CloudIdentity {
        tenant_id: identity.spec.tenant_id.clone(),
        client_id: identity.spec.client_id.clone(),
        client_secret,
        subscription_id: subscription_id.to_string(),
    })
}

fn not_found_is_invalid(what: String) -> impl FnOnce(kube::Error) -> ReconcileError {
    move |err| match err {
        kube::Error::Api(ref response) if response.code == 404 => {
            ReconcileError::InvalidConfig(format!("{what} not found"))
        }
        other => ReconcileError::Kube(other),
    }
}

/// Resolve the identity of an infrastructure cluster.
///
/// # Errors
///
/// Returns `InvalidConfig` for a missing identity reference, identity or secret, and `Kube`
/// for other API failures.
pub async fn load_identity(
    client: &Client,
    infra: &AzureCluster,
) -> Result<CloudIdentity, ReconcileError> {
    let namespace = infra.namespace().unwrap_or_default();
    let identity_ref = infra.spec.identity_ref.as_ref().ok_or_else(|| {
        ReconcileError::InvalidConfig(format!(
            "AzureCluster {}/{} has no identityRef",
            namespace,
            infra.name_any()
        ))
    })?;
    let identity_namespace = identity_ref.namespace.clone().unwrap_or(namespace);

    let identities: Api<AzureClusterIdentity> =
        Api::namespaced(client.clone(), &identity_namespace);
    let identity = retry_api_call(
        default_backoff(),
        || identities.get(&identity_ref.name),
        "GetAzureClusterIdentity",
    )
    .await
    .map_err(not_found_is_invalid(format!(
            "AzureClusterIdentity {identity_namespace}/{}",
            identity_ref.name
        )))?;

    if !SECRET_IDENTITY_TYPES.contains(&identity.spec.r#type.as_str()) {
        return Err(ReconcileError::InvalidConfig(format!(
            "AzureClusterIdentity {} has unsupported type {:?}",
            identity_ref.name, identity.spec.r#type
        )));
    }
    let secret_ref = identity.spec.client_secret.as_ref().ok_or_else(|| {
        ReconcileError::InvalidConfig(format!(
            "AzureClusterIdentity {} has no clientSecret reference",
            identity_ref.name
        ))
    })?;
    let secret_namespace = secret_ref
        .namespace
        .clone()
        .unwrap_or_else(|| identity_namespace.clone());
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &secret_namespace);
    let secret = retry_api_call(
        default_backoff(),
        || secrets.get(&secret_ref.name),
        "GetIdentitySecret",
    )
    .await
    .map_err(not_found_is_invalid(format!(
            "secret {secret_namespace}/{}",
            secret_ref.name
        )))?;

    identity_from(&identity, &secret, &infra.spec.subscription_id)
}

/// Resolve a hostname endpoint to its first IPv4 address.
async fn resolve_endpoint(host: &str) -> Result<Option<Ipv4Addr>, ReconcileError> {
    if host.parse::<Ipv4Addr>().is_ok() {
        return Ok(None);
    }
    let addresses = tokio::net::lookup_host((host, 0)).await.map_err(|e| {
        ReconcileError::CloudUnavailable {
            operation: "ResolveApiEndpoint",
            source: DnsApiError::Transient {
                status: None,
                message: format!("cannot resolve {host}: {e}"),
            },
        }
    })?;
    let resolved = addresses.into_iter().find_map(|addr| match addr.ip() {
        std::net::IpAddr::V4(ip) => Some(ip),
        std::net::IpAddr::V6(_) => None,
    });
    debug!(host, ?resolved, "Resolved API endpoint");
    Ok(resolved)
}

/// Resolve a hostname endpoint, treating resolution failure as "no address".
///
/// Used while tearing down a cluster, whose public IP and DNS label may already be gone.
pub async fn resolve_endpoint_or_none(host: &str) -> Option<Ipv4Addr> {
    match resolve_endpoint(host).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(host, error = %e, "API endpoint no longer resolves, continuing without it");
            None
        }
    }
}

/// Load the management cluster configured by `--management-cluster-name`.
///
/// # Errors
///
/// Returns `InvalidConfig` if the configured cluster or its identity is missing.
pub async fn load_management_cluster(
    client: &Client,
    config: &OperatorConfig,
) -> Result<Option<ManagementCluster>, ReconcileError> {
    let Some(name) = config.management_cluster_name.as_deref() else {
        return Ok(None);
    };
    let namespace = &config.management_cluster_namespace;
    let clusters: Api<AzureCluster> = Api::namespaced(client.clone(), namespace);
    let cluster = retry_api_call(default_backoff(), || clusters.get(name), "GetManagementCluster")
        .await
        .map_err(not_found_is_invalid(format!(
            "management AzureCluster {namespace}/{name}"
        )))?;
    let identity = load_identity(client, &cluster).await?;
    Ok(Some(ManagementCluster::from_azure_cluster(&cluster, identity)))
}

/// Load every input of a cluster and build its snapshot.
///
/// # Errors
///
/// Returns `InvalidConfig` for missing or malformed inputs, `Kube` for API failures and
/// `CloudUnavailable` when a hostname endpoint cannot be resolved.
pub async fn load_snapshot(
    client: &Client,
    config: &OperatorConfig,
    infra: &AzureCluster,
    cluster: Option<&Cluster>,
) -> Result<ClusterSnapshot, ReconcileError> {
    let identity = load_identity(client, infra).await?;
    let management_cluster = load_management_cluster(client, config).await?;
    let resolved_endpoint = match endpoint_host(infra, cluster) {
        Some(host) => resolve_endpoint(&host).await?,
        None => None,
    };

    build_snapshot(SnapshotInputs {
        infra,
        cluster,
        identity,
        resolved_endpoint,
        management_cluster,
        base_domain: &config.base_domain,
    })
}

/// Load the snapshot of a cluster that is being deleted.
///
/// An unresolvable endpoint is not an error here, and missing identities or secrets are
/// reported as `DeletionBlocked` so the teardown keeps being retried.
///
/// # Errors
///
/// Returns `DeletionBlocked` for missing or malformed inputs and `Kube` for API failures.
pub async fn load_deletion_snapshot(
    client: &Client,
    config: &OperatorConfig,
    infra: &AzureCluster,
    cluster: Option<&Cluster>,
) -> Result<ClusterSnapshot, ReconcileError> {
    let identity = load_identity(client, infra)
        .await
        .map_err(ReconcileError::during_deletion)?;
    let management_cluster = load_management_cluster(client, config)
        .await
        .map_err(ReconcileError::during_deletion)?;
    let resolved_endpoint = match endpoint_host(infra, cluster) {
        Some(host) => resolve_endpoint_or_none(&host).await,
        None => None,
    };

    build_snapshot(SnapshotInputs {
        infra,
        cluster,
        identity,
        resolved_endpoint,
        management_cluster,
        base_domain: &config.base_domain,
    })
    .map_err(ReconcileError::during_deletion)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod snapshot_tests;
