// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Gateway A-record discovery.
//!
//! Workload clusters expose gateways as `LoadBalancer` services. A service contributes DNS
//! records when it:
//!
//! 1. carries `cluster-dns-operator.io/managed: managed`
//! 2. carries a non-empty `external-dns.alpha.kubernetes.io/hostname` (comma separated)
//! 3. is of type `LoadBalancer`
//! 4. has at least one ingress IPv4
//!
//! The workload cluster is reached through the `<cluster>-kubeconfig` secret Cluster API
//! maintains next to the cluster. Connectivity problems are a soft failure: the zone is still
//! reconciled, gateway records are left alone, and the cluster is requeued.

use crate::constants::{KUBECONFIG_SECRET_KEY, KUBECONFIG_SECRET_SUFFIX};
use crate::labels::{
    GATEWAY_HOSTNAME_ANNOTATION, GATEWAY_MANAGED_ANNOTATION, GATEWAY_MANAGED_VALUE,
};
use crate::reconcilers::pagination::list_all_paginated;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// Service type of gateways
const LOAD_BALANCER_SERVICE_TYPE: &str = "LoadBalancer";

/// One hostname served by gateway services, with the union of their addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayRecord {
    pub hostname: String,
    pub addresses: Vec<Ipv4Addr>,
}

/// Result of looking for gateways in a workload cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayDiscovery {
    Discovered(Vec<GatewayRecord>),
    /// The workload cluster could not be reached; carries the reason
    Unavailable(String),
}

impl GatewayDiscovery {
    #[must_use]
    pub fn records(&self) -> &[GatewayRecord] {
        match self {
            Self::Discovered(records) => records,
            Self::Unavailable(_) => &[],
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Discovered(_))
    }
}

fn ingress_addresses(service: &Service) -> Vec<Ipv4Addr> {
    service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|entry| entry.ip.as_deref())
                .filter_map(|ip| ip.parse::<Ipv4Addr>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Hostnames of a service that qualifies as a managed gateway.
fn gateway_hostnames(service: &Service) -> Vec<String> {
    let annotations = service.annotations();
    if annotations.get(GATEWAY_MANAGED_ANNOTATION).map(String::as_str)
        != Some(GATEWAY_MANAGED_VALUE)
    {
        return Vec::new();
    }
    let is_load_balancer = service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        == Some(LOAD_BALANCER_SERVICE_TYPE);
    if !is_load_balancer {
        return Vec::new();
    }
    annotations
        .get(GATEWAY_HOSTNAME_ANNOTATION)
        .map(|value| {
            value
                .split(',')
                .map(|h| h.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Gateway records of a set of services, sorted by hostname.
///
/// Services sharing a hostname contribute the union of their addresses.
#[must_use]
pub fn gateway_records(services: &[Service]) -> Vec<GatewayRecord> {
    let mut by_hostname: BTreeMap<String, Vec<Ipv4Addr>> = BTreeMap::new();
    for service in services {
        let hostnames = gateway_hostnames(service);
        if hostnames.is_empty() {
            continue;
        }
        let addresses = ingress_addresses(service);
        if addresses.is_empty() {
            debug!(service = %service.name_any(), "Gateway service has no ingress IPv4 yet");
            continue;
        }
        for hostname in hostnames {
            let entry = by_hostname.entry(hostname).or_default();
            entry.extend(addresses.iter().copied());
            entry.sort_unstable();
            entry.dedup();
        }
    }
    by_hostname
        .into_iter()
        .map(|(hostname, addresses)| GatewayRecord {
            hostname,
            addresses,
        })
        .collect()
}

async fn workload_client(
    client: &Client,
    namespace: &str,
    cluster_name: &str,
) -> Result<Client, String> {
    let secret_name = format!("{cluster_name}{KUBECONFIG_SECRET_SUFFIX}");
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets
        .get(&secret_name)
        .await
        .map_err(|e| format!("cannot read secret {namespace}/{secret_name}: {e}"))?;
    let raw = secret
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_SECRET_KEY))
        .ok_or_else(|| format!("secret {namespace}/{secret_name} has no {KUBECONFIG_SECRET_KEY} key"))?;
    let yaml = std::str::from_utf8(&raw.0)
        .map_err(|e| format!("kubeconfig in {secret_name} is not UTF-8: {e}"))?;
    let kubeconfig =
        Kubeconfig::from_yaml(yaml).map_err(|e| format!("invalid kubeconfig in {secret_name}: {e}"))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| format!("unusable kubeconfig in {secret_name}: {e}"))?;
    Client::try_from(config).map_err(|e| format!("cannot build workload client: {e}"))
}

/// Discover gateway records in a workload cluster.
///
/// Never fails; connectivity problems come back as [`GatewayDiscovery::Unavailable`].
pub async fn discover_gateways(
    client: &Client,
    namespace: &str,
    cluster_name: &str,
    gateway_namespace: &str,
) -> GatewayDiscovery {
    let workload = match workload_client(client, namespace, cluster_name).await {
        Ok(workload) => workload,
        Err(reason) => {
            warn!(cluster = %cluster_name, %reason, "Workload cluster unreachable, skipping gateway records");
            return GatewayDiscovery::Unavailable(reason);
        }
    };
    let services: Api<Service> = Api::namespaced(workload, gateway_namespace);
    match list_all_paginated(&services, ListParams::default()).await {
        Ok(services) => {
            let records = gateway_records(&services);
            debug!(cluster = %cluster_name, count = records.len(), "Discovered gateway records");
            GatewayDiscovery::Discovered(records)
        }
        Err(e) => {
            let reason = format!("cannot list services in {gateway_namespace}: {e}");
            warn!(cluster = %cluster_name, %reason, "Gateway discovery failed");
            GatewayDiscovery::Unavailable(reason)
        }
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod gateway_tests;
