// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event reasons published on `Cluster` records.
//!
//! Reasons are programmatic identifiers in CamelCase, following Kubernetes conventions.
//! Every reconcile of a cluster ends in at most one event carrying one of these reasons.
//!
//! # Example Events
//!
//! ```text
//! TYPE      REASON                 MESSAGE
//! Normal    DNSZoneReconciled      Reconciled zone test-cluster.basedomain.io (3 operations)
//! Warning   CloudAuthFailed        Azure rejected credentials for client 0000-...
//! Warning   GatewayDiscoveryFailed Workload cluster unreachable, gateway records left as-is
//! ```

// ============================================================================
// Success Reasons
// ============================================================================

/// All enabled zones of the cluster converged.
pub const REASON_DNS_ZONE_RECONCILED: &str = "DNSZoneReconciled";

/// All zones and the delegation record of a deleted cluster were removed.
pub const REASON_DNS_ZONE_DELETED: &str = "DNSZoneDeleted";

/// A deleted cluster's zones cannot be torn down yet because an identity, secret or the
/// management cluster is missing. The finalizer stays and the teardown is retried.
pub const REASON_DNS_ZONE_DELETION_BLOCKED: &str = "DNSZoneDeletionBlocked";

// ============================================================================
// Failure Reasons
// ============================================================================

/// The cluster snapshot or operator configuration is invalid.
///
/// **Usage:**
/// - Missing base domain, identity or resource group
/// - Malformed IP annotations
/// - Unsupported identity types
///
/// Reconciles failing with this reason are not retried until the cluster changes.
pub const REASON_INVALID_CONFIGURATION: &str = "InvalidConfiguration";

/// Azure DNS returned a transient error (throttling, 5xx, timeout).
pub const REASON_CLOUD_UNAVAILABLE: &str = "CloudUnavailable";

/// Azure rejected the credentials of the identity used for the zone.
pub const REASON_CLOUD_AUTH_FAILED: &str = "CloudAuthFailed";

/// A concurrent writer modified the same resource (HTTP 409/412).
pub const REASON_CLOUD_CONFLICT: &str = "CloudConflict";

/// Azure refused a request as malformed.
pub const REASON_CLOUD_REQUEST_REJECTED: &str = "CloudRequestRejected";

/// The reconcile did not finish before its deadline.
pub const REASON_RECONCILE_TIMEOUT: &str = "ReconcileTimeout";

/// Kubernetes API calls (finalizer patch, secret read) failed.
pub const REASON_KUBERNETES_API_ERROR: &str = "KubernetesAPIError";

/// The workload cluster could not be reached to discover gateway services.
///
/// This is a soft failure: the rest of the zone is reconciled and gateway-derived records are
/// left untouched until discovery succeeds again.
pub const REASON_GATEWAY_DISCOVERY_FAILED: &str = "GatewayDiscoveryFailed";

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
