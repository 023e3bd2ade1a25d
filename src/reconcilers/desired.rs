// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state builders.
//!
//! Derive the record sets each zone should hold from a [`ClusterSnapshot`], together with the
//! [`ManagedSet`] the differ uses to decide which observed records it may touch. All builders
//! are pure.
//!
//! # Public per-cluster zone (`<cluster>.<base>`)
//!
//! | Name | Type | Value | When |
//! |------|------|-------|------|
//! | `api`, `apiserver` | A | API endpoint | endpoint is public |
//! | `bastion`, `bastion1` | A | bastion IP | `bastion-ip` annotated |
//! | `*` | CNAME | `ingress.<cluster>.<base>` | always |
//! | gateway label | A | gateway ingress IPs | per discovered gateway hostname |
//!
//! Private API zones hold `apiserver`, private ingress zones hold `ingress`. The base zone
//! holds one NS record named after the cluster.

use crate::constants::{
    APEX_RECORD_NAME, APISERVER_RECORD_NAME, API_RECORD_NAME, BASTION1_RECORD_NAME,
    BASTION_RECORD_NAME, DEFAULT_RECORD_TTL_SECS, DELEGATION_TTL_SECS, INGRESS_RECORD_NAME,
    WILDCARD_RECORD_NAME,
};
use crate::dns_errors::ReconcileError;
use crate::reconcilers::gateway::GatewayRecord;
use crate::reconcilers::snapshot::{ClusterSnapshot, EndpointVisibility};
use crate::records::{canonical_name, ManagedSet, RecordData, RecordSet, RecordType};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::warn;

/// Names written by the public zone builder regardless of gateways.
pub const STATIC_PUBLIC_NAMES: [&str; 6] = [
    APEX_RECORD_NAME,
    API_RECORD_NAME,
    APISERVER_RECORD_NAME,
    BASTION_RECORD_NAME,
    BASTION1_RECORD_NAME,
    WILDCARD_RECORD_NAME,
];

/// Longest DNS label
const MAX_LABEL_LEN: usize = 63;

/// Longest DNS name in presentation format
const MAX_NAME_LEN: usize = 253;

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate the names a snapshot contributes to DNS.
///
/// # Errors
///
/// Returns `InvalidConfig` if the cluster name or base domain are not valid DNS names.
pub fn validate_snapshot(snapshot: &ClusterSnapshot) -> Result<(), ReconcileError> {
    if !is_valid_label(&snapshot.cluster_name) {
        return Err(ReconcileError::InvalidConfig(format!(
            "cluster name {:?} is not a valid DNS label",
            snapshot.cluster_name
        )));
    }
    if snapshot.base_domain.is_empty() || !snapshot.base_domain.split('.').all(is_valid_label) {
        return Err(ReconcileError::InvalidConfig(format!(
            "base domain {:?} is not a valid DNS name",
            snapshot.base_domain
        )));
    }
    if snapshot.zone_fqdn().len() > MAX_NAME_LEN {
        return Err(ReconcileError::InvalidConfig(format!(
            "zone name {} is longer than {MAX_NAME_LEN} characters",
            snapshot.zone_fqdn()
        )));
    }
    Ok(())
}

fn a_record(name: &str, addresses: Vec<Ipv4Addr>) -> RecordSet {
    RecordSet::owned(name, DEFAULT_RECORD_TTL_SECS, RecordData::A(addresses))
}

/// Label of a gateway hostname relative to `zone`, or `None` if it lies outside the zone.
#[must_use]
pub fn relative_name(hostname: &str, zone: &str) -> Option<String> {
    let hostname = canonical_name(hostname);
    let zone = canonical_name(zone);
    if hostname == zone {
        return Some(APEX_RECORD_NAME.to_string());
    }
    hostname
        .strip_suffix(&zone)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .filter(|prefix| !prefix.is_empty() && prefix.split('.').all(is_valid_label))
        .map(str::to_string)
}

/// Gateway A records for the public per-cluster zone.
///
/// Hostnames outside the zone and hostnames colliding with the static names are skipped.
#[must_use]
pub fn gateway_record_sets(zone: &str, gateways: &[GatewayRecord]) -> Vec<RecordSet> {
    let mut records = Vec::new();
    for gateway in gateways {
        let Some(name) = relative_name(&gateway.hostname, zone) else {
            warn!(hostname = %gateway.hostname, %zone, "Gateway hostname is outside the cluster zone");
            continue;
        };
        if STATIC_PUBLIC_NAMES.contains(&name.as_str()) {
            warn!(hostname = %gateway.hostname, "Gateway hostname collides with a reserved record name");
            continue;
        }
        records.push(a_record(&name, gateway.addresses.clone()).from_gateway());
    }
    records
}

/// Desired record sets of the public per-cluster zone.
#[must_use]
pub fn public_zone_records(
    snapshot: &ClusterSnapshot,
    gateways: &[GatewayRecord],
) -> Vec<RecordSet> {
    let zone = snapshot.zone_fqdn();
    let mut records = Vec::new();

    if snapshot.api_endpoint_visibility == EndpointVisibility::Public {
        if let Some(ip) = snapshot.api_endpoint {
            records.push(a_record(API_RECORD_NAME, vec![ip]));
            records.push(a_record(APISERVER_RECORD_NAME, vec![ip]));
        }
    }
    if let Some(ip) = snapshot.bastion_ip {
        records.push(a_record(BASTION_RECORD_NAME, vec![ip]));
        records.push(a_record(BASTION1_RECORD_NAME, vec![ip]));
    }
    records.push(RecordSet::owned(
        WILDCARD_RECORD_NAME,
        DEFAULT_RECORD_TTL_SECS,
        RecordData::Cname(format!("{INGRESS_RECORD_NAME}.{zone}")),
    ));
    records.extend(gateway_record_sets(&zone, gateways));
    records
}

/// Names the engine owns in the public per-cluster zone.
///
/// When gateway discovery succeeded, observed gateway-marked records are adopted so records of
/// removed gateways get pruned. When it failed, only the currently desired gateway names are
/// managed, which leaves previously written gateway records in place.
#[must_use]
pub fn public_zone_managed_set(desired: &[RecordSet], gateways_discovered: bool) -> ManagedSet {
    let statics = STATIC_PUBLIC_NAMES
        .iter()
        .fold(ManagedSet::new(), |set, name| set.with_name(name));
    desired
        .iter()
        .fold(statics, |set, record| set.with_name(&record.name))
        .adopting_gateway_records(gateways_discovered)
}

/// Desired record sets of the private API zone.
///
/// # Errors
///
/// Returns `InvalidConfig` if the snapshot carries no private API address.
pub fn private_api_records(snapshot: &ClusterSnapshot) -> Result<Vec<RecordSet>, ReconcileError> {
    let ip = snapshot.private_api_ip.ok_or_else(|| {
        ReconcileError::InvalidConfig(format!(
            "cluster {} has a private API endpoint but no private API address",
            snapshot.cluster_name
        ))
    })?;
    Ok(vec![a_record(APISERVER_RECORD_NAME, vec![ip])])
}

#[must_use]
pub fn private_api_managed_set() -> ManagedSet {
    ManagedSet::new().with_name(APISERVER_RECORD_NAME)
}

/// Desired record sets of the private ingress zone.
///
/// # Errors
///
/// Returns `InvalidConfig` if the snapshot carries no private ingress address.
pub fn private_ingress_records(
    snapshot: &ClusterSnapshot,
) -> Result<Vec<RecordSet>, ReconcileError> {
    let ip = snapshot.private_ingress_ip.ok_or_else(|| {
        ReconcileError::InvalidConfig(format!(
            "cluster {} has no private ingress address",
            snapshot.cluster_name
        ))
    })?;
    Ok(vec![a_record(INGRESS_RECORD_NAME, vec![ip])])
}

#[must_use]
pub fn private_ingress_managed_set() -> ManagedSet {
    ManagedSet::new().with_name(INGRESS_RECORD_NAME)
}

/// The delegation NS record for `cluster` in the base zone.
///
/// Returns `None` when the child zone reported no name servers.
#[must_use]
pub fn delegation_record(cluster: &str, name_servers: &[String]) -> Option<RecordSet> {
    let hosts: Vec<String> = name_servers
        .iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if hosts.is_empty() {
        return None;
    }
    Some(RecordSet::owned(
        cluster,
        DELEGATION_TTL_SECS,
        RecordData::Ns(hosts),
    ))
}

/// The single record the engine owns in the base zone.
#[must_use]
pub fn delegation_managed_set(cluster: &str) -> ManagedSet {
    ManagedSet::new().with_record(cluster, RecordType::NS)
}

#[cfg(test)]
#[path = "desired_tests.rs"]
mod desired_tests;
