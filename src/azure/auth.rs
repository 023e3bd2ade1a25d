// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OAuth2 credentials for Azure Resource Manager.
//!
//! Service principals authenticate with the client-credentials grant against
//! `<authority>/<tenant>/oauth2/v2.0/token`. Tokens are cached per credential and refreshed
//! shortly before they expire.

use crate::constants::{ARM_TOKEN_SCOPE, TOKEN_REFRESH_MARGIN_SECS};
use crate::dns_errors::DnsApiError;
use crate::http_errors::{classify_connection_error, describe_http_status};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Source of bearer tokens for Resource Manager calls.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthFailed` when the identity is rejected and `Transient` when the token
    /// endpoint cannot be reached.
    async fn token(&self) -> Result<String, DnsApiError>;
}

/// A pre-acquired token, used for workload identity setups and tests.
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self) -> Result<String, DnsApiError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds; v1 endpoints return it as a string
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Client-credentials grant for a service principal.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(None),
        }
    }

    /// Whether this credential was built from the given secret.
    #[must_use]
    pub fn uses_secret(&self, client_secret: &str) -> bool {
        self.client_secret == client_secret
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    async fn request_token(&self) -> Result<CachedToken, DnsApiError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("scope", ARM_TOKEN_SCOPE)
            .finish();

        let response = self
            .http
            .post(self.token_url())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| classify_connection_error(&e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| classify_connection_error(&e))?;

        if status == 429 || status >= 500 {
            return Err(DnsApiError::Transient {
                status: Some(status),
                message: describe_http_status(status),
            });
        }
        if !(200..300).contains(&status) {
            let detail: TokenErrorResponse = serde_json::from_str(&text).unwrap_or_default();
            return Err(DnsApiError::AuthFailed {
                message: format!(
                    "token request for client {} in tenant {} failed ({}): {}",
                    self.client_id,
                    self.tenant_id,
                    detail.error.unwrap_or_else(|| status.to_string()),
                    detail.error_description.unwrap_or_default()
                ),
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| DnsApiError::Decode {
                message: format!("token response: {e}"),
            })?;
        let lifetime = token
            .expires_in
            .as_ref()
            .and_then(expires_in_secs)
            .unwrap_or(0);
        let refresh_in = lifetime.saturating_sub(TOKEN_REFRESH_MARGIN_SECS);

        debug!(
            client_id = %self.client_id,
            tenant_id = %self.tenant_id,
            expires_in = lifetime,
            "Acquired Azure Resource Manager token"
        );

        Ok(CachedToken {
            token: token.access_token,
            refresh_at: Instant::now() + Duration::from_secs(refresh_in),
        })
    }
}

fn expires_in_secs(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn token(&self) -> Result<String, DnsApiError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}
