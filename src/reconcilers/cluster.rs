// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcile loop of one workload cluster.
//!
//! Every `AzureCluster` is gated on its lifecycle before DNS is touched, protected by a
//! finalizer once it is, and reconciled in a fixed order: the public zone and its delegation
//! first, then every enabled private zone. Deletion runs the same zones in reverse.
//!
//! The zone work itself lives in [`ZoneSet`], which only needs DNS clients and a snapshot, so
//! it runs the same against Azure and against the in-memory fake.

use crate::azure::{DnsApi, DnsClientFactory, ZoneRef};
use crate::constants::{
    CLUSTER_PHASE_PROVISIONED, CONDITION_LOAD_BALANCERS_READY, GATED_REQUEUE_SECS,
    KIND_AZURE_CLUSTER, RECONCILE_REQUEUE_SECS, SOFT_FAILURE_REQUEUE_SECS,
};
use crate::context::{object_key, Context};
use crate::crd::{condition_is_true, AzureCluster, Cluster};
use crate::dns_errors::{ErrorKind, ReconcileError};
use crate::labels::FINALIZER_DNS_RECORDS;
use crate::metrics::{self, RESOURCE_TYPE_AZURE_CLUSTER};
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::reconcilers::gateway::{discover_gateways, GatewayDiscovery};
use crate::reconcilers::private_zone::{
    delete_private_zone, is_enabled, owned_private_zone_targets, reconcile_private_zone,
    PrivateZoneReport,
};
use crate::reconcilers::public_zone::{delete_public_zone, reconcile_public_zone, PublicZoneReport};
use crate::reconcilers::retry::{default_backoff, requeue_backoff, retry_api_call};
use crate::reconcilers::snapshot::{
    cluster_name, load_deletion_snapshot, load_snapshot, ClusterSnapshot,
};
use crate::status_reasons::{
    REASON_DNS_ZONE_DELETED, REASON_DNS_ZONE_RECONCILED, REASON_GATEWAY_DISCOVERY_FAILED,
};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType};
use kube::runtime::reflector::ObjectRef;
use kube::{Api, Resource, ResourceExt};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// How a reconcile ended, and when it runs next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// DNS converged
    Reconciled,
    /// The cluster is not ready for DNS yet
    Gated,
    /// DNS converged except for gateway records, which could not be discovered
    GatewayUnavailable,
    /// All zones were torn down and the finalizer removed
    Deleted,
    /// The reconcile failed
    Failed {
        kind: ErrorKind,
        retryable: bool,
        /// Consecutive failures of this object, this one included
        failures: u32,
    },
}

impl ReconcileOutcome {
    #[must_use]
    pub fn from_error(error: &ReconcileError, failures: u32) -> Self {
        Self::Failed {
            kind: error.kind(),
            retryable: error.is_retryable(),
            failures,
        }
    }

    /// Delay before the next reconcile; `None` waits for the object to change.
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Reconciled => Some(Duration::from_secs(RECONCILE_REQUEUE_SECS)),
            Self::Gated => Some(Duration::from_secs(GATED_REQUEUE_SECS)),
            Self::GatewayUnavailable => Some(Duration::from_secs(SOFT_FAILURE_REQUEUE_SECS)),
            Self::Deleted => None,
            Self::Failed {
                retryable: true,
                failures,
                ..
            } => Some(requeue_backoff(*failures)),
            Self::Failed { .. } => None,
        }
    }

    /// Label used for reconciliation metrics.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Reconciled => "success",
            Self::Gated => ErrorKind::GatedNotReady.as_str(),
            Self::GatewayUnavailable => "gateway_unavailable",
            Self::Deleted => "deleted",
            Self::Failed { kind, .. } => kind.as_str(),
        }
    }

    #[must_use]
    pub fn action(&self) -> Action {
        match self.requeue_after() {
            Some(delay) => Action::requeue(delay),
            None => Action::await_change(),
        }
    }
}

/// Check whether a cluster is ready for DNS.
///
/// # Errors
///
/// Returns the reason the cluster is gated.
pub fn readiness_gate(cluster: Option<&Cluster>, infra: &AzureCluster) -> Result<(), String> {
    let Some(cluster) = cluster else {
        return Err("owning Cluster not found".to_string());
    };
    if cluster.spec.paused {
        return Err("Cluster is paused".to_string());
    }
    let phase = cluster
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or_default();
    if phase != CLUSTER_PHASE_PROVISIONED {
        return Err(format!("Cluster phase is {phase:?}, waiting for {CLUSTER_PHASE_PROVISIONED}"));
    }
    let load_balancers_ready = infra
        .status
        .as_ref()
        .is_some_and(|s| condition_is_true(&s.conditions, CONDITION_LOAD_BALANCERS_READY));
    if !load_balancers_ready {
        return Err(format!("{CONDITION_LOAD_BALANCERS_READY} is not True"));
    }
    Ok(())
}

/// The `AzureCluster` a `Cluster` points at, used to map `Cluster` changes onto the queue.
#[must_use]
pub fn infrastructure_ref(cluster: &Cluster) -> Option<ObjectRef<AzureCluster>> {
    let reference = cluster.spec.infrastructure_ref.as_ref()?;
    if reference.kind.as_deref() != Some(KIND_AZURE_CLUSTER) || reference.name.is_empty() {
        return None;
    }
    let namespace = reference
        .namespace
        .clone()
        .or_else(|| cluster.namespace())
        .unwrap_or_default();
    Some(ObjectRef::new(&reference.name).within(&namespace))
}

/// Everything one reconcile changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZonesReport {
    pub public: PublicZoneReport,
    pub private: Vec<PrivateZoneReport>,
    /// Private zones deleted because the cluster no longer asks for them
    pub pruned: Vec<ZoneRef>,
}

impl ZonesReport {
    #[must_use]
    pub fn changes(&self) -> usize {
        self.public.changes()
            + self.private.iter().map(PrivateZoneReport::changes).sum::<usize>()
            + self.pruned.len()
    }

    /// Human readable summary for events.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut zones = vec![self.public.zone.fqdn.clone()];
        zones.extend(self.private.iter().map(|r| format!("{} (private)", r.zone.fqdn)));
        zones.extend(self.pruned.iter().map(|z| format!("{} (pruned)", z.fqdn)));
        format!("{} change(s) across {}", self.changes(), zones.join(", "))
    }
}

/// The DNS zones of clusters, driven through DNS clients only.
pub struct ZoneSet<'a> {
    pub factory: &'a dyn DnsClientFactory,
    /// Client holding the base-domain identity
    pub base: &'a dyn DnsApi,
    pub base_zone: &'a ZoneRef,
}

impl ZoneSet<'_> {
    fn client_for(
        &self,
        identity: &crate::azure::CloudIdentity,
    ) -> Result<Arc<dyn DnsApi>, ReconcileError> {
        self.factory.client(identity).map_err(|e| {
            ReconcileError::InvalidConfig(format!(
                "cannot build DNS client for client id {}: {e}",
                identity.client_id
            ))
        })
    }

    /// Converge the public zone, its delegation and the private zones.
    ///
    /// Enabled private zones are reconciled; owned private zones the snapshot no longer asks
    /// for are deleted together with their operator links.
    ///
    /// # Errors
    ///
    /// Returns the first zone error; later zones are not attempted.
    pub async fn reconcile(
        &self,
        snapshot: &ClusterSnapshot,
        gateways: &GatewayDiscovery,
    ) -> Result<ZonesReport, ReconcileError> {
        let dns = self.client_for(&snapshot.identity)?;
        let public =
            reconcile_public_zone(dns.as_ref(), self.base, self.base_zone, snapshot, gateways)
                .await?;

        let mut private = Vec::new();
        let mut pruned = Vec::new();
        for target in owned_private_zone_targets(snapshot) {
            let dns = self.client_for(&target.identity)?;
            if is_enabled(snapshot, target.variant) {
                private.push(reconcile_private_zone(dns.as_ref(), &target, snapshot).await?);
            } else if delete_private_zone(dns.as_ref(), &target).await? {
                info!(zone = %target.zone, variant = %target.variant, "Pruned disabled private zone");
                pruned.push(target.zone);
            }
        }
        Ok(ZonesReport {
            public,
            private,
            pruned,
        })
    }

    /// Tear down every zone of a cluster, private zones first.
    ///
    /// Every private zone the cluster may own is attempted, whether or not the snapshot still
    /// enables it; zones that are already gone count as deleted.
    ///
    /// # Errors
    ///
    /// Returns the first deletion error; the caller keeps the finalizer and retries.
    pub async fn delete(&self, snapshot: &ClusterSnapshot) -> Result<(), ReconcileError> {
        for target in owned_private_zone_targets(snapshot) {
            let dns = self.client_for(&target.identity)?;
            delete_private_zone(dns.as_ref(), &target).await?;
        }
        let dns = self.client_for(&snapshot.identity)?;
        delete_public_zone(dns.as_ref(), self.base, self.base_zone, snapshot).await
    }
}

/// Result of the cluster-specific part of a reconcile, before it is turned into an action.
struct Reconciled {
    outcome: ReconcileOutcome,
    event: Option<Event>,
}

fn normal_event(reason: &str, action: &str, note: String) -> Event {
    Event {
        type_: EventType::Normal,
        reason: reason.into(),
        note: Some(note),
        action: action.into(),
        secondary: None,
    }
}

fn warning_event(reason: &str, action: &str, note: String) -> Event {
    Event {
        type_: EventType::Warning,
        reason: reason.into(),
        note: Some(note),
        action: action.into(),
        secondary: None,
    }
}

async fn owning_cluster(
    ctx: &Context,
    infra: &AzureCluster,
) -> Result<Option<Cluster>, ReconcileError> {
    let namespace = infra.namespace().unwrap_or_default();
    let api: Api<Cluster> = Api::namespaced(ctx.client.clone(), &namespace);
    let name = cluster_name(infra);
    Ok(retry_api_call(default_backoff(), || api.get_opt(&name), "GetCluster").await?)
}

/// Run `work` under the reconcile deadline.
///
/// # Errors
///
/// Returns the error of `work`, or `DeadlineExceeded` if it did not finish in time.
pub async fn with_deadline<T, F>(deadline: Duration, work: F) -> Result<T, ReconcileError>
where
    F: Future<Output = Result<T, ReconcileError>>,
{
    tokio::time::timeout(deadline, work)
        .await
        .unwrap_or(Err(ReconcileError::DeadlineExceeded(deadline)))
}

/// Events go to the owning `Cluster`, falling back to the `AzureCluster` itself.
fn event_target(cluster: Option<&Cluster>, infra: &AzureCluster) -> ObjectReference {
    cluster.map_or_else(|| infra.object_ref(&()), |c| c.object_ref(&()))
}

async fn publish(ctx: &Context, target: &ObjectReference, event: &Event) {
    if let Err(e) = ctx.recorder.publish(event, target).await {
        warn!(reason = %event.reason, error = %e, "Failed to publish event");
    }
}

async fn reconcile_inner(
    infra: &AzureCluster,
    cluster: Option<&Cluster>,
    ctx: &Context,
) -> Result<Reconciled, ReconcileError> {
    let zones = ZoneSet {
        factory: ctx.dns_factory.as_ref(),
        base: ctx.base_dns.as_ref(),
        base_zone: &ctx.base_zone,
    };

    if infra.meta().deletion_timestamp.is_some() {
        if !has_finalizer(infra, FINALIZER_DNS_RECORDS) {
            debug!("Deleted cluster carries no DNS finalizer, nothing to clean up");
            return Ok(Reconciled {
                outcome: ReconcileOutcome::Deleted,
                event: None,
            });
        }
        let snapshot = load_deletion_snapshot(&ctx.client, &ctx.config, infra, cluster).await?;
        zones.delete(&snapshot).await?;
        remove_finalizer(&ctx.client, infra, FINALIZER_DNS_RECORDS).await?;
        info!(zone = %snapshot.zone_fqdn(), "Deleted DNS zones of cluster");
        return Ok(Reconciled {
            outcome: ReconcileOutcome::Deleted,
            event: Some(normal_event(
                REASON_DNS_ZONE_DELETED,
                "Deleting",
                format!("Deleted DNS zone {}", snapshot.zone_fqdn()),
            )),
        });
    }

    if let Err(reason) = readiness_gate(cluster, infra) {
        info!(%reason, "Cluster not ready for DNS, requeueing");
        return Ok(Reconciled {
            outcome: ReconcileOutcome::Gated,
            event: None,
        });
    }

    ensure_finalizer(&ctx.client, infra, FINALIZER_DNS_RECORDS).await?;

    let snapshot = load_snapshot(&ctx.client, &ctx.config, infra, cluster).await?;
    let gateways = discover_gateways(
        &ctx.client,
        &snapshot.namespace,
        &snapshot.cluster_name,
        &ctx.config.gateway_namespace,
    )
    .await;
    let report = zones.reconcile(&snapshot, &gateways).await?;
    info!(
        zone = %snapshot.zone_fqdn(),
        changes = report.changes(),
        private_zones = report.private.len(),
        "Reconciled DNS zones"
    );

    let reconciled = match gateways {
        GatewayDiscovery::Unavailable(reason) => Reconciled {
            outcome: ReconcileOutcome::GatewayUnavailable,
            event: Some(warning_event(
                REASON_GATEWAY_DISCOVERY_FAILED,
                "Reconciling",
                format!("Gateway records kept unchanged: {reason}"),
            )),
        },
        GatewayDiscovery::Discovered(_) => Reconciled {
            outcome: ReconcileOutcome::Reconciled,
            event: (report.changes() > 0).then(|| {
                normal_event(REASON_DNS_ZONE_RECONCILED, "Reconciling", report.summary())
            }),
        },
    };
    Ok(reconciled)
}

/// Reconcile one `AzureCluster`.
///
/// # Errors
///
/// Returns the classified error; [`error_policy`] turns it into a requeue.
#[instrument(skip_all, fields(cluster = %object_key(infra.as_ref())))]
pub async fn reconcile(
    infra: Arc<AzureCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let key = object_key(infra.as_ref());
    let deadline = ctx.config.reconcile_deadline();

    let mut target = event_target(None, &infra);
    let result = with_deadline(deadline, async {
        let cluster = owning_cluster(&ctx, &infra).await?;
        target = event_target(cluster.as_ref(), &infra);
        reconcile_inner(&infra, cluster.as_ref(), &ctx).await
    })
    .await;

    match result {
        Ok(reconciled) => {
            ctx.failures.reset(&key);
            let outcome = reconciled.outcome;
            metrics::record_reconciliation(
                RESOURCE_TYPE_AZURE_CLUSTER,
                outcome.status(),
                start.elapsed(),
            );
            if outcome.requeue_after().is_some() {
                metrics::record_requeue(RESOURCE_TYPE_AZURE_CLUSTER, outcome.status());
            }
            if let Some(event) = reconciled.event {
                publish(&ctx, &target, &event).await;
            }
            Ok(outcome.action())
        }
        Err(e) => {
            metrics::record_reconciliation(
                RESOURCE_TYPE_AZURE_CLUSTER,
                e.kind().as_str(),
                start.elapsed(),
            );
            let event = warning_event(e.status_reason(), "Reconciling", e.to_string());
            publish(&ctx, &target, &event).await;
            Err(e)
        }
    }
}

/// Requeue policy for failed reconciles.
///
/// Retryable errors back off exponentially per object; invalid configuration waits for the
/// object to change.
pub fn error_policy(infra: Arc<AzureCluster>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    let key = object_key(infra.as_ref());
    let failures = if error.is_retryable() {
        ctx.failures.record_failure(&key)
    } else {
        ctx.failures.failures(&key)
    };
    let outcome = ReconcileOutcome::from_error(error, failures);
    match outcome.requeue_after() {
        Some(delay) => {
            warn!(cluster = %key, error = %error, failures, ?delay, "Reconcile failed, retrying");
            metrics::record_requeue(RESOURCE_TYPE_AZURE_CLUSTER, outcome.status());
        }
        None => error!(cluster = %key, error = %error, "Reconcile failed, waiting for a change"),
    }
    outcome.action()
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
