// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record-set synchronization shared by the zone reconcilers.
//!
//! Every zone is reconciled the same way:
//!
//! 1. list the observed record sets (creating the zone when the list reports it missing)
//! 2. diff them against the desired record sets, restricted to the managed names
//! 3. apply the resulting operations in order, stopping at the first failure
//! 4. publish the zone metrics
//!
//! The zone reconcilers only differ in what they desire and in what they do around these
//! steps (delegation, virtual network links).

use crate::azure::{method, DnsApi, ZoneRef};
use crate::dns_errors::ReconcileError;
use crate::metrics;
use crate::reconcilers::diff::diff;
use crate::records::{ManagedSet, ObservedRecordSet, Op, RecordKey, RecordSet};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Record sets of a zone as listed at the start of a reconcile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneObservation {
    pub observed: Vec<ObservedRecordSet>,
    /// The list reported the zone missing and it was created by this call
    pub created: bool,
}

/// Outcome of synchronizing one zone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordSync {
    /// Operations applied, in order
    pub applied: Vec<Op>,
    /// Record sets in the zone after the operations were applied
    pub record_count: usize,
    pub zone_created: bool,
}

/// List the record sets of `zone`, creating it first if it does not exist.
///
/// A `ParentResourceNotFound` answer from the list is the signal that the zone is missing; it
/// never surfaces to the caller.
///
/// # Errors
///
/// Returns the classified cloud error of the first failing call.
pub async fn list_or_create_zone(
    dns: &dyn DnsApi,
    zone: &ZoneRef,
    tags: &BTreeMap<String, String>,
) -> Result<ZoneObservation, ReconcileError> {
    match dns.list_record_sets(zone).await {
        Ok(observed) => Ok(ZoneObservation {
            observed,
            created: false,
        }),
        Err(e) if e.is_parent_not_found() => {
            info!(%zone, "DNS zone does not exist, creating it");
            dns.create_or_update_zone(zone, tags)
                .await
                .map_err(|e| ReconcileError::cloud(method::CREATE_OR_UPDATE_ZONE, e))?;
            let observed = dns
                .list_record_sets(zone)
                .await
                .map_err(|e| ReconcileError::cloud(method::LIST_RECORD_SETS, e))?;
            Ok(ZoneObservation {
                observed,
                created: true,
            })
        }
        Err(e) => Err(ReconcileError::cloud(method::LIST_RECORD_SETS, e)),
    }
}

/// Apply differ operations in order.
///
/// # Errors
///
/// The first failing call aborts the remaining operations; operations already applied stay
/// applied and the next reconcile picks up from the observed state.
pub async fn apply_ops(dns: &dyn DnsApi, zone: &ZoneRef, ops: &[Op]) -> Result<(), ReconcileError> {
    for op in ops {
        match op {
            Op::Upsert(record) => dns
                .create_or_update_record_set(zone, record)
                .await
                .map_err(|e| ReconcileError::cloud(method::CREATE_OR_UPDATE_RECORD_SET, e))?,
            Op::Delete { name, record_type } => dns
                .delete_record_set(zone, name, *record_type)
                .await
                .map_err(|e| ReconcileError::cloud(method::DELETE_RECORD_SET, e))?,
        }
        info!(%zone, operation = %op, "Applied DNS record change");
    }
    Ok(())
}

/// Number of record sets left in a zone once `ops` were applied to `observed`.
#[must_use]
pub fn record_count_after(observed: &[ObservedRecordSet], ops: &[Op]) -> usize {
    let mut keys: BTreeSet<RecordKey> = observed.iter().map(ObservedRecordSet::key).collect();
    for op in ops {
        match op {
            Op::Upsert(record) => {
                keys.insert(record.key());
            }
            Op::Delete { name, record_type } => {
                keys.remove(&RecordKey::new(name, *record_type));
            }
        }
    }
    keys.len()
}

/// Bring the managed record sets of an existing zone in line with `desired`.
///
/// # Errors
///
/// Returns the classified cloud error of the first failing call.
pub async fn sync_records(
    dns: &dyn DnsApi,
    zone: &ZoneRef,
    observation: ZoneObservation,
    desired: &[RecordSet],
    managed: &ManagedSet,
) -> Result<RecordSync, ReconcileError> {
    let ops = diff(desired, &observation.observed, managed);
    if ops.is_empty() {
        debug!(%zone, "DNS records already converged");
    }
    apply_ops(dns, zone, &ops).await?;
    Ok(RecordSync {
        record_count: record_count_after(&observation.observed, &ops),
        applied: ops,
        zone_created: observation.created,
    })
}

/// Publish the per-zone gauges once a zone has converged.
pub fn publish_zone_metrics(zone: &ZoneRef, sync: &RecordSync, desired: &[RecordSet]) {
    let kind = zone.kind.as_str();
    metrics::set_zone_records(&zone.fqdn, kind, sync.record_count as u64);
    metrics::set_record_set_info(&zone.fqdn, kind, desired);
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod records_tests;
