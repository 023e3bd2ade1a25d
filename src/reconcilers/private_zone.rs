// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Private zone reconciliation.
//!
//! A cluster can own up to two private zones:
//!
//! | Variant | Zone | Resource group | Linked network | Identity |
//! |---------|------|----------------|----------------|----------|
//! | [`PrivateZoneVariant::ApiServer`] | `<wc>.<base>` | management cluster | management vnet | management |
//! | [`PrivateZoneVariant::Ingress`] | `<mc>.<base>` | workload cluster | workload vnet | workload |
//!
//! The API variant lets the management cluster reach a private workload API; the ingress
//! variant lets the workload cluster reach the management cluster's private ingress.
//!
//! # State machine
//!
//! ```text
//! Absent -> Creating -> Present -> (LinkMissing | LinkDivergent) -> Linked -> Reconciled
//! ```
//!
//! Every transition is driven by what the API reports; nothing is persisted between
//! reconciles. The phases a reconcile went through are returned in [`PrivateZoneReport`].

use crate::azure::{method, CloudIdentity, DnsApi, VirtualNetworkLink, ZoneRef};
use crate::constants::VNET_LINK_SUFFIX;
use crate::dns_errors::ReconcileError;
use crate::labels::LINK_OWNER_TAG;
use crate::metrics;
use crate::reconcilers::desired::{
    private_api_managed_set, private_api_records, private_ingress_managed_set,
    private_ingress_records,
};
use crate::reconcilers::records::{
    list_or_create_zone, publish_zone_metrics, sync_records, RecordSync,
};
use crate::reconcilers::snapshot::{ClusterSnapshot, EndpointVisibility, ManagementCluster};
use crate::records::{ManagedSet, RecordSet};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

/// Observed state of one private zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrivateZonePhase {
    /// The zone does not exist
    Absent,
    /// The zone was created by this reconcile
    Creating,
    /// The zone exists
    Present,
    /// No link connects the zone to the target network
    LinkMissing,
    /// A link exists but under another name, to another network or with registration on
    LinkDivergent,
    /// The operator link connects the zone to the target network
    Linked,
    /// Links and records have converged
    Reconciled,
}

/// Which private zone of a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrivateZoneVariant {
    ApiServer,
    Ingress,
}

impl fmt::Display for PrivateZoneVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiServer => f.write_str("private API"),
            Self::Ingress => f.write_str("private ingress"),
        }
    }
}

/// Where a private zone lives and who writes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateZoneTarget {
    pub variant: PrivateZoneVariant,
    pub zone: ZoneRef,
    pub virtual_network_id: Option<String>,
    pub identity: CloudIdentity,
    pub tags: BTreeMap<String, String>,
}

impl PrivateZoneTarget {
    /// Deterministic name of the operator link.
    #[must_use]
    pub fn link_name(&self) -> String {
        format!("{}{VNET_LINK_SUFFIX}", self.zone.resource_group)
    }

    /// Desired record sets of this zone.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the snapshot lacks the address this variant publishes.
    pub fn desired(&self, snapshot: &ClusterSnapshot) -> Result<Vec<RecordSet>, ReconcileError> {
        match self.variant {
            PrivateZoneVariant::ApiServer => private_api_records(snapshot),
            PrivateZoneVariant::Ingress => private_ingress_records(snapshot),
        }
    }

    #[must_use]
    pub fn managed(&self) -> ManagedSet {
        match self.variant {
            PrivateZoneVariant::ApiServer => private_api_managed_set(),
            PrivateZoneVariant::Ingress => private_ingress_managed_set(),
        }
    }

    fn owns(&self, link: &VirtualNetworkLink) -> bool {
        link.name == self.link_name()
            || link.tags.get(LINK_OWNER_TAG).map(String::as_str)
                == Some(self.identity.client_id.as_str())
    }
}

fn api_server_target(snapshot: &ClusterSnapshot, mc: &ManagementCluster) -> PrivateZoneTarget {
    PrivateZoneTarget {
        variant: PrivateZoneVariant::ApiServer,
        zone: ZoneRef::private(&mc.resource_group, snapshot.zone_fqdn()),
        virtual_network_id: mc.virtual_network_id.clone(),
        identity: mc.identity.clone(),
        tags: snapshot.tags.clone(),
    }
}

fn ingress_target(snapshot: &ClusterSnapshot, mc: &ManagementCluster) -> PrivateZoneTarget {
    PrivateZoneTarget {
        variant: PrivateZoneVariant::Ingress,
        zone: ZoneRef::private(
            &snapshot.resource_group,
            format!("{}.{}", mc.name, snapshot.base_domain),
        ),
        virtual_network_id: snapshot.virtual_network_id.clone(),
        identity: snapshot.identity.clone(),
        tags: snapshot.tags.clone(),
    }
}

/// Whether the snapshot currently asks for the private zone of `variant`.
#[must_use]
pub fn is_enabled(snapshot: &ClusterSnapshot, variant: PrivateZoneVariant) -> bool {
    match variant {
        PrivateZoneVariant::ApiServer => {
            snapshot.api_endpoint_visibility == EndpointVisibility::Private
        }
        PrivateZoneVariant::Ingress => {
            snapshot.private_ingress_ip.is_some() && snapshot.virtual_network_id.is_some()
        }
    }
}

/// Every private zone a cluster may own, enabled or not.
///
/// Both variants are returned whenever a remote management cluster is configured, so zones
/// created under an earlier configuration are still found once their inputs are gone.
#[must_use]
pub fn owned_private_zone_targets(snapshot: &ClusterSnapshot) -> Vec<PrivateZoneTarget> {
    let Some(mc) = snapshot.remote_management_cluster() else {
        return Vec::new();
    };
    vec![api_server_target(snapshot, mc), ingress_target(snapshot, mc)]
}

/// The private zones enabled for a cluster.
#[must_use]
pub fn private_zone_targets(snapshot: &ClusterSnapshot) -> Vec<PrivateZoneTarget> {
    owned_private_zone_targets(snapshot)
        .into_iter()
        .filter(|target| is_enabled(snapshot, target.variant))
        .collect()
}

/// One change to the links of a private zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkStep {
    Delete(String),
    Upsert(VirtualNetworkLink),
}

/// The link the operator wants on a private zone.
#[must_use]
pub fn desired_link(target: &PrivateZoneTarget, network_id: &str) -> VirtualNetworkLink {
    VirtualNetworkLink {
        name: target.link_name(),
        network_id: network_id.to_string(),
        registration_enabled: false,
        tags: BTreeMap::from([(
            LINK_OWNER_TAG.to_string(),
            target.identity.client_id.clone(),
        )]),
        provisioning_state: None,
    }
}

/// Plan the link changes that leave exactly one operator link on the target network.
///
/// The deterministic name is the authoritative ownership check; links carrying the owner tag
/// of the writing identity are adopted too. A foreign link on the target network is replaced,
/// since Azure allows one link per network and zone.
#[must_use]
pub fn plan_links(
    target: &PrivateZoneTarget,
    observed: &[VirtualNetworkLink],
    desired: &VirtualNetworkLink,
) -> (PrivateZonePhase, Vec<LinkStep>) {
    let same_network =
        |link: &VirtualNetworkLink| link.network_id.eq_ignore_ascii_case(&desired.network_id);

    if let Some(current) = observed.iter().find(|link| link.name == desired.name) {
        let stray: Vec<&VirtualNetworkLink> = observed
            .iter()
            .filter(|link| link.name != desired.name && same_network(link))
            .collect();
        if same_network(current) && !current.registration_enabled && stray.is_empty() {
            return (PrivateZonePhase::Linked, Vec::new());
        }
        let mut steps: Vec<LinkStep> = stray
            .iter()
            .map(|link| LinkStep::Delete(link.name.clone()))
            .collect();
        if !same_network(current) {
            steps.push(LinkStep::Delete(current.name.clone()));
        }
        steps.push(LinkStep::Upsert(desired.clone()));
        return (PrivateZonePhase::LinkDivergent, steps);
    }

    let replaced: Vec<&VirtualNetworkLink> = observed
        .iter()
        .filter(|link| same_network(link) || target.owns(link))
        .collect();
    let phase = if replaced.is_empty() {
        PrivateZonePhase::LinkMissing
    } else {
        PrivateZonePhase::LinkDivergent
    };
    let mut steps: Vec<LinkStep> = replaced
        .iter()
        .map(|link| LinkStep::Delete(link.name.clone()))
        .collect();
    steps.push(LinkStep::Upsert(desired.clone()));
    (phase, steps)
}

async fn apply_link_steps(
    dns: &dyn DnsApi,
    zone: &ZoneRef,
    steps: &[LinkStep],
) -> Result<(), ReconcileError> {
    for step in steps {
        match step {
            LinkStep::Delete(name) => {
                match dns.delete_virtual_network_link(zone, name).await {
                    Ok(()) => info!(%zone, link = %name, "Deleted virtual network link"),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => {
                        return Err(ReconcileError::cloud(method::DELETE_VIRTUAL_NETWORK_LINK, e))
                    }
                }
            }
            LinkStep::Upsert(link) => {
                dns.create_or_update_virtual_network_link(zone, link)
                    .await
                    .map_err(|e| {
                        ReconcileError::cloud(method::CREATE_OR_UPDATE_VIRTUAL_NETWORK_LINK, e)
                    })?;
                info!(%zone, link = %link.name, network = %link.network_id, "Linked virtual network");
            }
        }
    }
    Ok(())
}

/// What one private zone reconcile observed and changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateZoneReport {
    pub zone: ZoneRef,
    /// Phases in the order they were observed
    pub phases: Vec<PrivateZonePhase>,
    pub link_steps: Vec<LinkStep>,
    pub records: RecordSync,
}

impl PrivateZoneReport {
    #[must_use]
    pub fn phase(&self) -> PrivateZonePhase {
        self.phases
            .last()
            .copied()
            .unwrap_or(PrivateZonePhase::Absent)
    }

    /// Number of cloud writes made, zone creation included.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.records.applied.len() + self.link_steps.len() + usize::from(self.records.zone_created)
    }
}

/// Converge one private zone: zone, link, then records.
///
/// # Errors
///
/// Returns `InvalidConfig` when the snapshot lacks the published address or the target has no
/// virtual network, and the classified cloud error of the first failing call.
#[instrument(skip_all, fields(zone = %target.zone.fqdn, variant = %target.variant))]
pub async fn reconcile_private_zone(
    dns: &dyn DnsApi,
    target: &PrivateZoneTarget,
    snapshot: &ClusterSnapshot,
) -> Result<PrivateZoneReport, ReconcileError> {
    let desired = target.desired(snapshot)?;
    let network_id = target.virtual_network_id.as_deref().ok_or_else(|| {
        ReconcileError::InvalidConfig(format!(
            "{} zone {} has no virtual network to link",
            target.variant, target.zone.fqdn
        ))
    })?;
    let zone = &target.zone;

    let observation = list_or_create_zone(dns, zone, &target.tags).await?;
    let mut phases = if observation.created {
        vec![PrivateZonePhase::Absent, PrivateZonePhase::Creating]
    } else {
        vec![PrivateZonePhase::Present]
    };

    let links = dns
        .list_virtual_network_links(zone)
        .await
        .map_err(|e| ReconcileError::cloud(method::LIST_VIRTUAL_NETWORK_LINKS, e))?;
    let (link_phase, link_steps) = plan_links(target, &links, &desired_link(target, network_id));
    if link_phase != PrivateZonePhase::Linked {
        phases.push(link_phase);
        apply_link_steps(dns, zone, &link_steps).await?;
    }
    phases.push(PrivateZonePhase::Linked);

    let records = sync_records(dns, zone, observation, &desired, &target.managed()).await?;
    phases.push(PrivateZonePhase::Reconciled);
    debug!(%zone, ?phases, "Private zone reconciled");

    metrics::set_zone_info(
        &zone.fqdn,
        zone.kind.as_str(),
        &zone.resource_group,
        &target.identity.tenant_id,
        &target.identity.subscription_id,
    );
    publish_zone_metrics(zone, &records, &desired);

    Ok(PrivateZoneReport {
        zone: zone.clone(),
        phases,
        link_steps,
        records,
    })
}

/// Tear down one private zone: operator links first, then the zone.
///
/// Links owned by others are left alone. A zone that is already gone counts as deleted.
/// Returns whether the zone existed.
///
/// # Errors
///
/// Returns the classified cloud error of the first failing call.
#[instrument(skip_all, fields(zone = %target.zone.fqdn, variant = %target.variant))]
pub async fn delete_private_zone(
    dns: &dyn DnsApi,
    target: &PrivateZoneTarget,
) -> Result<bool, ReconcileError> {
    let zone = &target.zone;
    let links = match dns.list_virtual_network_links(zone).await {
        Ok(links) => links,
        Err(e) if e.is_not_found() => {
            debug!(%zone, "Private DNS zone absent");
            return Ok(false);
        }
        Err(e) => return Err(ReconcileError::cloud(method::LIST_VIRTUAL_NETWORK_LINKS, e)),
    };

    let steps: Vec<LinkStep> = links
        .iter()
        .filter(|link| target.owns(link))
        .map(|link| LinkStep::Delete(link.name.clone()))
        .collect();
    apply_link_steps(dns, zone, &steps).await?;

    match dns.delete_zone(zone).await {
        Ok(()) => info!(%zone, "Deleted private DNS zone"),
        Err(e) if e.is_not_found() => info!(%zone, "Private DNS zone already deleted"),
        Err(e) => return Err(ReconcileError::cloud(method::DELETE_ZONE, e)),
    }
    metrics::clear_zone(&zone.fqdn, zone.kind.as_str());
    Ok(true)
}

#[cfg(test)]
#[path = "private_zone_tests.rs"]
mod private_zone_tests;
