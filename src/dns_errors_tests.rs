// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for DNS error types.

#[cfg(test)]
mod tests {
    use crate::dns_errors::*;
    use crate::status_reasons::*;
    use std::time::Duration;

    fn not_found(code: &str) -> DnsApiError {
        DnsApiError::NotFound {
            resource: "dnsZones/test.io/recordsets".to_string(),
            code: code.to_string(),
            message: "missing".to_string(),
        }
    }

    #[test]
    fn test_parent_not_found_codes() {
        assert!(not_found("ParentResourceNotFound").is_parent_not_found());
        assert!(not_found("ResourceNotFound").is_parent_not_found());
        assert!(not_found("parentresourcenotfound").is_parent_not_found());
        assert!(!not_found("NotFound").is_parent_not_found());
        assert!(not_found("NotFound").is_not_found());
    }

    #[test]
    fn test_transient_display_with_and_without_status() {
        let error = DnsApiError::Transient {
            status: Some(503),
            message: "busy".to_string(),
        };
        assert_eq!(error.to_string(), "transient error (HTTP 503): busy");
        assert!(error.is_transient());

        let error = DnsApiError::Transient {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(error.to_string(), "transient error: connection refused");
    }

    #[test]
    fn test_only_transient_is_retried_in_place() {
        let conflict = DnsApiError::Conflict {
            resource: "A/api".to_string(),
            message: "etag".to_string(),
        };
        let auth = DnsApiError::AuthFailed {
            message: "invalid_client".to_string(),
        };
        assert!(!conflict.is_transient());
        assert!(!auth.is_transient());
        assert!(!not_found("ParentResourceNotFound").is_transient());
    }

    #[test]
    fn test_cloud_classification() {
        let error = ReconcileError::cloud(
            "ListRecordSets",
            DnsApiError::AuthFailed {
                message: "expired".to_string(),
            },
        );
        assert_eq!(error.kind(), ErrorKind::AuthFailed);
        assert_eq!(error.status_reason(), REASON_CLOUD_AUTH_FAILED);
        assert!(error.is_retryable());

        let error = ReconcileError::cloud(
            "CreateOrUpdateRecordSet",
            DnsApiError::Conflict {
                resource: "A/api".to_string(),
                message: "etag".to_string(),
            },
        );
        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert_eq!(error.status_reason(), REASON_CLOUD_CONFLICT);

        let error = ReconcileError::cloud(
            "DeleteZone",
            DnsApiError::Transient {
                status: Some(500),
                message: "boom".to_string(),
            },
        );
        assert_eq!(error.kind(), ErrorKind::CloudUnavailable);
        assert_eq!(error.status_reason(), REASON_CLOUD_UNAVAILABLE);
        assert_eq!(
            error.to_string(),
            "DeleteZone failed: transient error (HTTP 500): boom"
        );
    }

    #[test]
    fn test_rejected_keeps_its_own_reason() {
        let error = ReconcileError::cloud(
            "CreateOrUpdateZone",
            DnsApiError::Rejected {
                status: 400,
                code: "BadRequest".to_string(),
                message: "invalid zone name".to_string(),
            },
        );
        assert_eq!(error.kind(), ErrorKind::CloudUnavailable);
        assert_eq!(error.status_reason(), REASON_CLOUD_REQUEST_REJECTED);
    }

    #[test]
    fn test_invalid_config_is_terminal() {
        let error = ReconcileError::InvalidConfig("missing resource group".to_string());
        assert!(!error.is_retryable());
        assert_eq!(error.status_reason(), REASON_INVALID_CONFIGURATION);
        assert_eq!(error.kind().as_str(), "invalid_config");
    }

    #[test]
    fn test_deadline_exceeded_is_retryable() {
        let error = ReconcileError::DeadlineExceeded(Duration::from_secs(300));
        assert!(error.is_retryable());
        assert_eq!(error.status_reason(), REASON_RECONCILE_TIMEOUT);
        assert_eq!(error.to_string(), "reconcile exceeded its deadline of 300s");
    }

    #[test]
    fn test_invalid_config_during_deletion_is_retried() {
        let error = ReconcileError::InvalidConfig(
            "AzureClusterIdentity org-acme/test-cluster-identity not found".to_string(),
        )
        .during_deletion();
        assert!(error.is_retryable());
        assert_eq!(error.kind(), ErrorKind::DeletionBlocked);
        assert_eq!(error.kind().as_str(), "deletion_blocked");
        assert_eq!(error.status_reason(), REASON_DNS_ZONE_DELETION_BLOCKED);

        let timeout = ReconcileError::DeadlineExceeded(Duration::from_secs(300)).during_deletion();
        assert_eq!(timeout.kind(), ErrorKind::DeadlineExceeded);
    }
}
