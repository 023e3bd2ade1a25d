// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Public per-cluster zone reconciliation.
//!
//! Owns `<cluster>.<base>` in the cluster's resource group: creates it when missing,
//! converges the managed record sets, then delegates the zone from the base zone using the
//! name servers Azure assigned to it.

use crate::azure::{method, DnsApi, ZoneRef};
use crate::dns_errors::ReconcileError;
use crate::metrics;
use crate::reconcilers::delegation::{delete_delegation, reconcile_delegation};
use crate::reconcilers::desired::{
    public_zone_managed_set, public_zone_records, validate_snapshot,
};
use crate::reconcilers::gateway::GatewayDiscovery;
use crate::reconcilers::records::{
    list_or_create_zone, publish_zone_metrics, sync_records, RecordSync,
};
use crate::reconcilers::snapshot::ClusterSnapshot;
use crate::records::Op;
use tracing::{info, instrument};

/// What one public zone reconcile changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicZoneReport {
    pub zone: ZoneRef,
    pub records: RecordSync,
    /// Operations applied to the base zone
    pub delegation: Vec<Op>,
    pub name_servers: Vec<String>,
}

impl PublicZoneReport {
    /// Number of cloud writes made, zone creation included.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.records.applied.len() + self.delegation.len() + usize::from(self.records.zone_created)
    }
}

/// The public zone of a cluster.
#[must_use]
pub fn public_zone_ref(snapshot: &ClusterSnapshot) -> ZoneRef {
    ZoneRef::public(&snapshot.resource_group, snapshot.zone_fqdn())
}

/// Converge the public zone of a cluster and its delegation.
///
/// # Arguments
///
/// * `dns` - Client holding the cluster identity
/// * `base` - Client holding the base-domain identity
/// * `base_zone` - The shared base zone
/// * `snapshot` - Inputs of this reconcile
/// * `gateways` - Gateway discovery result; when unavailable, existing gateway records are kept
///
/// # Errors
///
/// Returns `InvalidConfig` for invalid names and the classified cloud error of the first
/// failing call.
#[instrument(skip_all, fields(zone = %snapshot.zone_fqdn()))]
pub async fn reconcile_public_zone(
    dns: &dyn DnsApi,
    base: &dyn DnsApi,
    base_zone: &ZoneRef,
    snapshot: &ClusterSnapshot,
    gateways: &GatewayDiscovery,
) -> Result<PublicZoneReport, ReconcileError> {
    validate_snapshot(snapshot)?;
    let zone = public_zone_ref(snapshot);

    let desired = public_zone_records(snapshot, gateways.records());
    let managed = public_zone_managed_set(&desired, gateways.is_available());

    let observation = list_or_create_zone(dns, &zone, &snapshot.tags).await?;
    let records = sync_records(dns, &zone, observation, &desired, &managed).await?;

    let name_servers = dns
        .get_zone(&zone)
        .await
        .map_err(|e| ReconcileError::cloud(method::GET_ZONE, e))?
        .name_servers;
    let delegation =
        reconcile_delegation(base, base_zone, &snapshot.cluster_name, &name_servers).await?;

    metrics::set_zone_info(
        &zone.fqdn,
        zone.kind.as_str(),
        &zone.resource_group,
        &snapshot.identity.tenant_id,
        &snapshot.identity.subscription_id,
    );
    publish_zone_metrics(&zone, &records, &desired);

    Ok(PublicZoneReport {
        zone,
        records,
        delegation,
        name_servers,
    })
}

/// Tear down the public zone of a cluster.
///
/// The delegation goes first so resolvers never follow it to a deleted zone. A zone that is
/// already gone counts as deleted.
///
/// # Errors
///
/// Returns the classified cloud error of the first failing call.
#[instrument(skip_all, fields(zone = %snapshot.zone_fqdn()))]
pub async fn delete_public_zone(
    dns: &dyn DnsApi,
    base: &dyn DnsApi,
    base_zone: &ZoneRef,
    snapshot: &ClusterSnapshot,
) -> Result<(), ReconcileError> {
    let zone = public_zone_ref(snapshot);
    delete_delegation(base, base_zone, &snapshot.cluster_name).await?;

    match dns.delete_zone(&zone).await {
        Ok(()) => info!(%zone, "Deleted DNS zone"),
        Err(e) if e.is_not_found() => info!(%zone, "DNS zone already deleted"),
        Err(e) => return Err(ReconcileError::cloud(method::DELETE_ZONE, e)),
    }
    metrics::clear_zone(&zone.fqdn, zone.kind.as_str());
    Ok(())
}

#[cfg(test)]
#[path = "public_zone_tests.rs"]
mod public_zone_tests;
