// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration.
//!
//! Every flag can also be set through the environment variable named next to it.

use crate::constants::{
    DEFAULT_ARM_ENDPOINT, DEFAULT_AUTHORITY_HOST, DEFAULT_CONCURRENCY, DEFAULT_GATEWAY_NAMESPACE,
    DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_RECONCILE_TIMEOUT_SECS,
};
use crate::azure::CloudIdentity;
use crate::dns_errors::ReconcileError;
use clap::Parser;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Operator configuration.
#[derive(Parser, Clone)]
#[command(version, about = "Reconciles the Azure DNS zones of Cluster API workload clusters")]
pub struct OperatorConfig {
    /// Base domain; per-cluster zones are `<cluster>.<base domain>`
    #[arg(long, env = "BASE_DOMAIN")]
    pub base_domain: String,

    /// Resource group of the base zone
    #[arg(long, env = "BASE_DOMAIN_RESOURCE_GROUP")]
    pub base_domain_resource_group: String,

    #[arg(long, env = "BASE_DOMAIN_SUBSCRIPTION_ID")]
    pub base_domain_subscription_id: String,

    #[arg(long, env = "BASE_DOMAIN_TENANT_ID")]
    pub base_domain_tenant_id: String,

    #[arg(long, env = "BASE_DOMAIN_CLIENT_ID")]
    pub base_domain_client_id: String,

    #[arg(long, env = "BASE_DOMAIN_CLIENT_SECRET", hide_env_values = true)]
    pub base_domain_client_secret: String,

    /// Only reconcile clusters labelled `cluster.x-k8s.io/watch-filter=<value>`
    #[arg(long, env = "WATCH_FILTER")]
    pub watch_filter: Option<String>,

    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,

    /// Only reconcile while holding the leader lease
    #[arg(long, env = "LEADER_ELECT", default_value_t = false)]
    pub leader_elect: bool,

    #[arg(long, env = "LEADER_ELECTION_NAMESPACE", default_value = "default")]
    pub leader_election_namespace: String,

    /// Name of the management cluster's `AzureCluster`; enables private zones
    #[arg(long, env = "MANAGEMENT_CLUSTER_NAME")]
    pub management_cluster_name: Option<String>,

    #[arg(long, env = "MANAGEMENT_CLUSTER_NAMESPACE", default_value = "default")]
    pub management_cluster_namespace: String,

    /// Namespace of gateway services inside workload clusters
    #[arg(long, env = "GATEWAY_NAMESPACE", default_value = DEFAULT_GATEWAY_NAMESPACE)]
    pub gateway_namespace: String,

    /// Deadline of one reconcile, in seconds
    #[arg(long, env = "RECONCILE_TIMEOUT", default_value_t = DEFAULT_RECONCILE_TIMEOUT_SECS)]
    pub reconcile_timeout: u64,

    /// Clusters reconciled in parallel
    #[arg(long, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: u16,

    #[arg(long, env = "AZURE_ENDPOINT", default_value = DEFAULT_ARM_ENDPOINT)]
    pub azure_endpoint: String,

    #[arg(long, env = "AZURE_AUTHORITY_HOST", default_value = DEFAULT_AUTHORITY_HOST)]
    pub azure_authority_host: String,
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("base_domain", &self.base_domain)
            .field("base_domain_resource_group", &self.base_domain_resource_group)
            .field("base_domain_identity", &self.base_domain_identity())
            .field("watch_filter", &self.watch_filter)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("leader_elect", &self.leader_elect)
            .field("management_cluster_name", &self.management_cluster_name)
            .field("gateway_namespace", &self.gateway_namespace)
            .field("reconcile_timeout", &self.reconcile_timeout)
            .field("concurrency", &self.concurrency)
            .field("azure_endpoint", &self.azure_endpoint)
            .finish_non_exhaustive()
    }
}

impl OperatorConfig {
    /// Check required values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first missing or malformed setting.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        let required = [
            ("base-domain", &self.base_domain),
            ("base-domain-resource-group", &self.base_domain_resource_group),
            ("base-domain-subscription-id", &self.base_domain_subscription_id),
            ("base-domain-tenant-id", &self.base_domain_tenant_id),
            ("base-domain-client-id", &self.base_domain_client_id),
            ("base-domain-client-secret", &self.base_domain_client_secret),
        ];
        for (flag, value) in required {
            if value.trim().is_empty() {
                return Err(ReconcileError::InvalidConfig(format!("--{flag} must not be empty")));
            }
        }
        if self.base_domain.starts_with('.') || self.base_domain.ends_with('.') {
            return Err(ReconcileError::InvalidConfig(format!(
                "--base-domain {} must not start or end with a dot",
                self.base_domain
            )));
        }
        if self.reconcile_timeout == 0 {
            return Err(ReconcileError::InvalidConfig(
                "--reconcile-timeout must be at least 1 second".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ReconcileError::InvalidConfig(
                "--concurrency must be at least 1".to_string(),
            ));
        }
        for (flag, value) in [
            ("azure-endpoint", &self.azure_endpoint),
            ("azure-authority-host", &self.azure_authority_host),
        ] {
            url::Url::parse(value).map_err(|e| {
                ReconcileError::InvalidConfig(format!("--{flag} {value} is not a URL: {e}"))
            })?;
        }
        Ok(())
    }

    /// Identity owning the base zone.
    #[must_use]
    pub fn base_domain_identity(&self) -> CloudIdentity {
        CloudIdentity {
            tenant_id: self.base_domain_tenant_id.clone(),
            client_id: self.base_domain_client_id.clone(),
            client_secret: self.base_domain_client_secret.clone(),
            subscription_id: self.base_domain_subscription_id.clone(),
        }
    }

    #[must_use]
    pub fn reconcile_deadline(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
