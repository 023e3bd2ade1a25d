// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP status mapping for Azure Resource Manager responses.
//!
//! Resource Manager reports failures as an HTTP status plus a JSON body of the shape
//! `{"error": {"code": "...", "message": "..."}}`. This module turns the pair into a
//! [`DnsApiError`] so the rest of the operator never inspects raw status codes.
//!
//! # HTTP Code Mapping
//!
//! | HTTP Code | Classification | Meaning |
//! |-----------|----------------|---------|
//! | 401, 403  | `AuthFailed`   | Credentials rejected or missing role assignment |
//! | 404       | `NotFound`     | Resource (or its parent zone) does not exist |
//! | 409, 412  | `Conflict`     | Concurrent writer or `If-Match` precondition failed |
//! | 429       | `Transient`    | Throttled |
//! | 5xx       | `Transient`    | Resource Manager or DNS backend failure |
//! | other 4xx | `Rejected`     | Request is invalid and will not succeed on retry |

use crate::dns_errors::DnsApiError;
use serde::Deserialize;

/// ARM error envelope.
#[derive(Debug, Default, Deserialize)]
pub struct ArmErrorBody {
    #[serde(default)]
    pub error: Option<ArmErrorDetail>,
}

/// Inner ARM error detail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Generic explanation of an HTTP status, used when the body carries no message.
#[must_use]
pub fn describe_http_status(status_code: u16) -> String {
    match status_code {
        400 => "Invalid request to Azure Resource Manager (400)".into(),
        401 => "Azure authentication required (401)".into(),
        403 => "Azure authorization failed (403)".into(),
        404 => "Resource not found in Azure DNS (404)".into(),
        409 => "Conflicting concurrent modification (409)".into(),
        412 => "Precondition failed (412)".into(),
        429 => "Azure Resource Manager throttled the request (429)".into(),
        500 => "Azure Resource Manager internal error (500)".into(),
        502 => "Bad gateway reaching Azure Resource Manager (502)".into(),
        503 => "Azure Resource Manager unavailable (503)".into(),
        504 => "Gateway timeout reaching Azure Resource Manager (504)".into(),
        _ => format!("Unexpected HTTP error from Azure Resource Manager ({status_code})"),
    }
}

/// Classify an ARM failure from its status and raw body.
///
/// # Arguments
///
/// * `status_code` - HTTP status of the response
/// * `resource` - ARM path that was addressed, used in error messages
/// * `body` - Raw response body; may be empty or non-JSON
#[must_use]
pub fn classify_http_error(status_code: u16, resource: &str, body: &str) -> DnsApiError {
    let detail = serde_json::from_str::<ArmErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_default();
    let code = detail.code.unwrap_or_else(|| status_code.to_string());
    let message = detail
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| describe_http_status(status_code));

    match status_code {
        401 | 403 => DnsApiError::AuthFailed { message },
        404 => DnsApiError::NotFound {
            resource: resource.to_string(),
            code,
            message,
        },
        409 | 412 => DnsApiError::Conflict {
            resource: resource.to_string(),
            message,
        },
        429 | 500..=599 => DnsApiError::Transient {
            status: Some(status_code),
            message,
        },
        _ => DnsApiError::Rejected {
            status: status_code,
            code,
            message,
        },
    }
}

/// Classify a transport-level `reqwest` failure (no HTTP status received).
#[must_use]
pub fn classify_connection_error(err: &reqwest::Error) -> DnsApiError {
    if err.is_decode() {
        return DnsApiError::Decode {
            message: err.to_string(),
        };
    }
    DnsApiError::Transient {
        status: err.status().map(|s| s.as_u16()),
        message: format!("Cannot connect to Azure Resource Manager: {err}"),
    }
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
