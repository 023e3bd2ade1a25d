// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud DNS and reconcile error types.
//!
//! This module provides two layers of errors:
//! - [`DnsApiError`]: the classification of a failed Azure DNS call, produced by the facade
//! - [`ReconcileError`]: the per-reconcile taxonomy the controller acts on (requeue, events)
//!
//! [`ErrorKind`] flattens both into the label set used for outcomes and metrics, including the
//! sentinels that are consumed locally and never surface as errors.

use crate::status_reasons::{
    REASON_CLOUD_AUTH_FAILED, REASON_CLOUD_CONFLICT, REASON_CLOUD_REQUEST_REJECTED,
    REASON_CLOUD_UNAVAILABLE, REASON_DNS_ZONE_DELETION_BLOCKED, REASON_INVALID_CONFIGURATION,
    REASON_KUBERNETES_API_ERROR, REASON_RECONCILE_TIMEOUT,
};
use std::time::Duration;
use thiserror::Error;

/// Azure error code returned when listing children of a zone that does not exist.
pub const ARM_CODE_PARENT_RESOURCE_NOT_FOUND: &str = "ParentResourceNotFound";

/// Azure error code returned for a missing top-level resource.
pub const ARM_CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFound";

/// Errors returned by the cloud DNS facade.
///
/// Every variant carries the Azure error code when the API supplied one, so callers can tell a
/// missing parent zone apart from a missing record set.
#[derive(Error, Debug, Clone)]
pub enum DnsApiError {
    /// The resource, or the zone it lives in, does not exist (HTTP 404)
    ///
    /// When `code` is `ParentResourceNotFound` the engine treats it as "zone does not exist"
    /// and creates the zone instead of failing.
    #[error("{resource} not found ({code}): {message}")]
    NotFound {
        /// The ARM resource path that was addressed
        resource: String,
        /// Azure error code, e.g. `ParentResourceNotFound`
        code: String,
        /// Error message from the API
        message: String,
    },

    /// Token acquisition failed or Azure rejected the credentials (HTTP 401/403)
    #[error("authentication failed: {message}")]
    AuthFailed {
        /// Error message from the token endpoint or Resource Manager
        message: String,
    },

    /// Throttling, server-side failure or network error (HTTP 429, 5xx, connect/timeout)
    #[error("transient error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transient {
        /// HTTP status, absent for connection-level failures
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// A concurrent writer collided with this request (HTTP 409/412)
    #[error("conflict on {resource}: {message}")]
    Conflict {
        /// The ARM resource path that was addressed
        resource: String,
        /// Error message from the API
        message: String,
    },

    /// Azure refused the request as invalid (any other 4xx, or a failed long-running operation)
    #[error("request rejected (HTTP {status}, {code}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Azure error code
        code: String,
        /// Error message from the API
        message: String,
    },

    /// A response body could not be decoded
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decoder error message
        message: String,
    },
}

impl DnsApiError {
    /// Returns true if the addressed resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the zone containing the addressed resource does not exist.
    ///
    /// Both public and private DNS report a missing zone as `ParentResourceNotFound` on list
    /// calls; `ResourceNotFound` is accepted as well because some API versions use it.
    #[must_use]
    pub fn is_parent_not_found(&self) -> bool {
        match self {
            Self::NotFound { code, .. } => {
                code.eq_ignore_ascii_case(ARM_CODE_PARENT_RESOURCE_NOT_FOUND)
                    || code.eq_ignore_ascii_case(ARM_CODE_RESOURCE_NOT_FOUND)
            }
            _ => false,
        }
    }

    /// Returns true if the HTTP call should be retried in place.
    ///
    /// Only throttling and server-side failures qualify; conflicts are left to the work
    /// queue so the next reconcile re-reads the current state.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the event reason for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::AuthFailed { .. } => REASON_CLOUD_AUTH_FAILED,
            Self::Conflict { .. } => REASON_CLOUD_CONFLICT,
            Self::Rejected { .. } => REASON_CLOUD_REQUEST_REJECTED,
            Self::NotFound { .. } | Self::Transient { .. } | Self::Decode { .. } => {
                REASON_CLOUD_UNAVAILABLE
            }
        }
    }
}

/// Flat classification of reconcile failures and sentinels.
///
/// Used for [`crate::reconcilers::cluster::ReconcileOutcome`] and as the `status` label of
/// the reconciliation counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfig,
    CloudUnavailable,
    AuthFailed,
    /// Sentinel: a list hit a missing zone; consumed by the zone reconcilers
    ParentResourceNotFound,
    /// Sentinel: the cluster is not yet eligible for DNS
    GatedNotReady,
    Conflict,
    DeadlineExceeded,
    DeletionBlocked,
    Kube,
    Fatal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfig => "invalid_config",
            Self::CloudUnavailable => "cloud_unavailable",
            Self::AuthFailed => "auth_failed",
            Self::ParentResourceNotFound => "parent_resource_not_found",
            Self::GatedNotReady => "gated_not_ready",
            Self::Conflict => "conflict",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::DeletionBlocked => "deletion_blocked",
            Self::Kube => "kube",
            Self::Fatal => "fatal",
        }
    }
}

/// Errors surfaced by one reconcile of a cluster.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Snapshot or configuration validation failed; not retried until the input changes
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A cloud DNS call failed
    #[error("{operation} failed: {source}")]
    CloudUnavailable {
        /// Facade operation that failed, e.g. `CreateOrUpdateRecordSet`
        operation: &'static str,
        #[source]
        source: DnsApiError,
    },

    /// Credentials were rejected
    #[error("{operation} failed: {source}")]
    AuthFailed {
        operation: &'static str,
        #[source]
        source: DnsApiError,
    },

    /// Concurrent modification of a cloud resource
    #[error("{operation} failed: {source}")]
    Conflict {
        operation: &'static str,
        #[source]
        source: DnsApiError,
    },

    /// Kubernetes API call failed
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The reconcile ran past its deadline
    #[error("reconcile exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// Inputs needed to tear down a deleted cluster's zones are missing; retried until they
    /// are restored so the finalizer is never released with zones left behind
    #[error("deletion blocked: {0}")]
    DeletionBlocked(String),

    /// Plumbing failure that cannot be fixed by retrying
    #[error("{0}")]
    Fatal(String),
}

impl ReconcileError {
    /// Wrap a facade error, classifying it by kind.
    #[must_use]
    pub fn cloud(operation: &'static str, source: DnsApiError) -> Self {
        match source {
            DnsApiError::AuthFailed { .. } => Self::AuthFailed { operation, source },
            DnsApiError::Conflict { .. } => Self::Conflict { operation, source },
            _ => Self::CloudUnavailable { operation, source },
        }
    }

    /// Reclassify invalid configuration met while tearing down a deleted cluster.
    ///
    /// Deletion must eventually release the finalizer, so it keeps retrying instead of waiting
    /// for a change the deleted object will never get.
    #[must_use]
    pub fn during_deletion(self) -> Self {
        match self {
            Self::InvalidConfig(reason) => Self::DeletionBlocked(reason),
            other => other,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::CloudUnavailable { .. } => ErrorKind::CloudUnavailable,
            Self::AuthFailed { .. } => ErrorKind::AuthFailed,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Kube(_) => ErrorKind::Kube,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Self::DeletionBlocked(_) => ErrorKind::DeletionBlocked,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// Returns true if the work queue should retry this reconcile with backoff.
    ///
    /// Invalid configuration waits for the cluster to change; everything else is retried,
    /// including credential failures, since identity secrets are rotated out-of-band.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_) | Self::Fatal(_))
    }

    /// Returns the event reason for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) | Self::Fatal(_) => REASON_INVALID_CONFIGURATION,
            Self::CloudUnavailable { source, .. }
            | Self::AuthFailed { source, .. }
            | Self::Conflict { source, .. } => source.status_reason(),
            Self::Kube(_) => REASON_KUBERNETES_API_ERROR,
            Self::DeadlineExceeded(_) => REASON_RECONCILE_TIMEOUT,
            Self::DeletionBlocked(_) => REASON_DNS_ZONE_DELETION_BLOCKED,
        }
    }
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
