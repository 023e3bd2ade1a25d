// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the cluster controller.
//!
//! The controller receives an `Arc<Context>` that contains:
//! - Kubernetes client of the management cluster
//! - Operator configuration
//! - Azure DNS client factory and the client bound to the base-domain identity
//! - Event recorder
//! - Per-cluster consecutive failure counts driving requeue backoff

use crate::azure::{DnsApi, DnsClientFactory, ZoneRef};
use crate::config::OperatorConfig;
use crate::constants::EVENT_REPORTER;
use crate::dns_errors::DnsApiError;
use kube::runtime::events::{Recorder, Reporter};
use kube::{Client, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared context passed to the controller.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    pub config: OperatorConfig,

    /// Builds DNS clients for cluster identities
    pub dns_factory: Arc<dyn DnsClientFactory>,

    /// Client holding the base-domain identity
    pub base_dns: Arc<dyn DnsApi>,

    /// The shared base zone every cluster is delegated from
    pub base_zone: ZoneRef,

    pub recorder: Recorder,

    pub failures: Arc<FailureTracker>,
}

impl Context {
    /// Build the context, creating the base-domain DNS client up front.
    ///
    /// # Errors
    ///
    /// Returns the factory error when the base-domain client cannot be built.
    pub fn new(
        client: Client,
        config: OperatorConfig,
        dns_factory: Arc<dyn DnsClientFactory>,
    ) -> Result<Self, DnsApiError> {
        let base_dns = dns_factory.client(&config.base_domain_identity())?;
        let base_zone = ZoneRef::public(&config.base_domain_resource_group, &config.base_domain);
        let reporter = Reporter {
            controller: EVENT_REPORTER.into(),
            instance: std::env::var("POD_NAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);

        Ok(Self {
            client,
            config,
            dns_factory,
            base_dns,
            base_zone,
            recorder,
            failures: Arc::new(FailureTracker::default()),
        })
    }
}

/// Consecutive failed reconciles per object, keyed by `namespace/name`.
#[derive(Debug, Default)]
pub struct FailureTracker {
    counts: Mutex<HashMap<String, u32>>,
}

impl FailureTracker {
    fn counts(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        match self.counts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Count one more failure for `key` and return the new total.
    pub fn record_failure(&self, key: &str) -> u32 {
        let mut counts = self.counts();
        let count = counts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget the failures of `key` after a successful reconcile.
    pub fn reset(&self, key: &str) {
        self.counts().remove(key);
    }

    #[must_use]
    pub fn failures(&self, key: &str) -> u32 {
        self.counts().get(key).copied().unwrap_or(0)
    }
}

/// Work queue key of a namespaced object.
#[must_use]
pub fn object_key<K: ResourceExt>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
