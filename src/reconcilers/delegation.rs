// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NS delegation of per-cluster zones from the shared base zone.
//!
//! The base zone is shared by every cluster. A cluster only ever reads and writes the single
//! NS record set named after it, so the base zone is never listed.

use crate::azure::{method, DnsApi, ZoneRef};
use crate::dns_errors::{DnsApiError, ReconcileError};
use crate::reconcilers::desired::{delegation_managed_set, delegation_record};
use crate::reconcilers::diff::diff;
use crate::reconcilers::records::apply_ops;
use crate::records::{ObservedRecordSet, Op, RecordType};
use tracing::{debug, info};

async fn observed_delegation(
    base: &dyn DnsApi,
    base_zone: &ZoneRef,
    cluster: &str,
) -> Result<Vec<ObservedRecordSet>, ReconcileError> {
    match base.get_record_set(base_zone, cluster, RecordType::NS).await {
        Ok(record) => Ok(vec![record]),
        Err(e) if e.is_parent_not_found() => Err(ReconcileError::InvalidConfig(format!(
            "base {base_zone} does not exist"
        ))),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(ReconcileError::cloud(method::GET_RECORD_SET, e)),
    }
}

/// Point the `<cluster>` NS record of the base zone at the child zone's name servers.
///
/// # Arguments
///
/// * `base` - Client holding the base-domain credentials
/// * `base_zone` - The shared base zone
/// * `cluster` - Child label, i.e. the cluster name
/// * `name_servers` - Name servers reported by the child zone
///
/// # Errors
///
/// Returns `CloudUnavailable` when the child zone reported no name servers yet, `InvalidConfig`
/// when the base zone does not exist, and the classified cloud error of any failing call.
pub async fn reconcile_delegation(
    base: &dyn DnsApi,
    base_zone: &ZoneRef,
    cluster: &str,
    name_servers: &[String],
) -> Result<Vec<Op>, ReconcileError> {
    let desired = delegation_record(cluster, name_servers).ok_or_else(|| {
        ReconcileError::cloud(
            method::GET_ZONE,
            DnsApiError::Decode {
                message: format!("zone {cluster}.{} reported no name servers", base_zone.fqdn),
            },
        )
    })?;

    let observed = observed_delegation(base, base_zone, cluster).await?;
    let ops = diff(
        std::slice::from_ref(&desired),
        &observed,
        &delegation_managed_set(cluster),
    );
    if ops.is_empty() {
        debug!(zone = %base_zone.fqdn, %cluster, "Delegation already up to date");
    }
    apply_ops(base, base_zone, &ops).await?;
    Ok(ops)
}

/// Remove the `<cluster>` NS record from the base zone.
///
/// A missing record or a missing base zone count as success.
///
/// # Errors
///
/// Returns the classified cloud error of the delete call.
pub async fn delete_delegation(
    base: &dyn DnsApi,
    base_zone: &ZoneRef,
    cluster: &str,
) -> Result<(), ReconcileError> {
    match base
        .delete_record_set(base_zone, cluster, RecordType::NS)
        .await
    {
        Ok(()) => {
            info!(zone = %base_zone.fqdn, %cluster, "Removed delegation");
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(ReconcileError::cloud(method::DELETE_RECORD_SET, e)),
    }
}

#[cfg(test)]
#[path = "delegation_tests.rs"]
mod delegation_tests;
