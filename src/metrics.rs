// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the cluster DNS operator.
//!
//! Zone and cloud API metrics use stable bare names (`zone_info`, `zone_records_sum`,
//! `record_set_info`, `api_request_total`, `api_request_errors_total`) that dashboards and
//! alerts key on. Operator-internal metrics carry the namespace prefix `cluster_dns_operator_`.
//!
//! # Metrics Categories
//!
//! - **Zone Metrics** - Live zones, their record counts and the managed record sets
//! - **Cloud API Metrics** - Requests and errors per Azure DNS facade method
//! - **Reconciliation Metrics** - Reconcile outcomes, durations and requeues
//! - **Leader Election Metrics** - Leadership state changes
//!
//! # Example
//!
//! ```rust,no_run
//! use cluster_dns_operator::metrics::{gather_metrics, record_api_request};
//!
//! record_api_request("ListRecordSets");
//! let text = gather_metrics().unwrap_or_default();
//! ```

use crate::records::{record_fqdn, RecordSet};
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for operator-internal metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "cluster_dns_operator";

/// Resource type label used for reconciliation metrics
pub const RESOURCE_TYPE_AZURE_CLUSTER: &str = "AzureCluster";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Zone Metrics
// ============================================================================

/// Live zones, set to 1 while the zone exists
///
/// Labels:
/// - `zone`: Zone FQDN
/// - `type`: `public` or `private`
/// - `resource_group`, `tenant_id`, `subscription_id`: Where the zone lives
pub static ZONE_INFO: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "zone_info",
        "DNS zones managed by the operator",
    );
    let gauge = GaugeVec::new(
        opts,
        &["zone", "type", "resource_group", "tenant_id", "subscription_id"],
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Number of record sets observed in a zone
pub static ZONE_RECORDS_SUM: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "zone_records_sum",
        "Number of record sets in a managed zone",
    );
    let gauge = GaugeVec::new(opts, &["zone", "type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Managed record sets, one series per payload value
///
/// Labels:
/// - `zone`: Zone FQDN
/// - `fqdn`: Record FQDN
/// - `ip`: Address, CNAME target or name server
/// - `ttl`: TTL in seconds
/// - `type`: Record type
pub static RECORD_SET_INFO: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "record_set_info",
        "Record sets managed by the operator",
    );
    let gauge = GaugeVec::new(opts, &["zone", "fqdn", "ip", "ttl", "type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Cloud API Metrics
// ============================================================================

/// Azure DNS requests by facade method
pub static API_REQUEST_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "api_request_total",
        "Total number of Azure DNS API requests by method",
    );
    let counter = CounterVec::new(opts, &["method"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Failed Azure DNS requests by facade method
pub static API_REQUEST_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "api_request_errors_total",
        "Total number of failed Azure DNS API requests by method",
    );
    let counter = CounterVec::new(opts, &["method"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (`AzureCluster`)
/// - `status`: `success`, `gated` or an error kind (`cloud_unavailable`, ...)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `reason`: `resync`, `gated`, `soft_failure`, `error`
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Total number of leader election events
pub static LEADER_ELECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_elections_total"),
        "Total number of leader election events by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Current leader status (1 = leader, 0 = follower)
pub static LEADER_STATUS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leader election status (1 = leader, 0 = follower)",
    );
    let gauge = GaugeVec::new(opts, &["pod_name"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Zone Series Tracking
// ============================================================================

/// Label values currently exported for one zone, so stale series can be removed.
#[derive(Default)]
struct ZoneSeries {
    info: Option<[String; 5]>,
    records: Vec<[String; 5]>,
}

static ZONE_SERIES: LazyLock<Mutex<HashMap<(String, String), ZoneSeries>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn with_zone_series<R>(zone: &str, kind: &str, f: impl FnOnce(&mut ZoneSeries) -> R) -> R {
    let mut series = ZONE_SERIES.lock().unwrap_or_else(PoisonError::into_inner);
    f(series
        .entry((zone.to_string(), kind.to_string()))
        .or_default())
}

fn labels(values: &[String; 5]) -> [&str; 5] {
    [
        values[0].as_str(),
        values[1].as_str(),
        values[2].as_str(),
        values[3].as_str(),
        values[4].as_str(),
    ]
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Mark a zone as live.
pub fn set_zone_info(
    zone: &str,
    kind: &str,
    resource_group: &str,
    tenant_id: &str,
    subscription_id: &str,
) {
    let values = [
        zone.to_string(),
        kind.to_string(),
        resource_group.to_string(),
        tenant_id.to_string(),
        subscription_id.to_string(),
    ];
    with_zone_series(zone, kind, |series| {
        if let Some(previous) = series.info.take() {
            if previous != values {
                let _ = ZONE_INFO.remove_label_values(&labels(&previous));
            }
        }
        ZONE_INFO.with_label_values(&labels(&values)).set(1.0);
        series.info = Some(values);
    });
}

/// Record the number of record sets observed in a zone.
pub fn set_zone_records(zone: &str, kind: &str, count: u64) {
    #[allow(clippy::cast_precision_loss)]
    ZONE_RECORDS_SUM
        .with_label_values(&[zone, kind])
        .set(count as f64);
}

/// Replace the exported record-set series of a zone with `records`.
pub fn set_record_set_info(zone: &str, kind: &str, records: &[RecordSet]) {
    let values: Vec<[String; 5]> = records
        .iter()
        .flat_map(|record| {
            let fqdn = record_fqdn(&record.name, zone);
            let ttl = record.ttl.to_string();
            let record_type = record.record_type().to_string();
            record.data.values().into_iter().map(move |value| {
                [
                    zone.to_string(),
                    fqdn.clone(),
                    value,
                    ttl.clone(),
                    record_type.clone(),
                ]
            })
        })
        .collect();

    with_zone_series(zone, kind, |series| {
        for stale in series.records.iter().filter(|v| !values.contains(v)) {
            let _ = RECORD_SET_INFO.remove_label_values(&labels(stale));
        }
        for current in &values {
            RECORD_SET_INFO.with_label_values(&labels(current)).set(1.0);
        }
        series.records = values;
    });
}

/// Remove every series of a deleted zone.
pub fn clear_zone(zone: &str, kind: &str) {
    let mut all = ZONE_SERIES.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(series) = all.remove(&(zone.to_string(), kind.to_string())) {
        if let Some(info) = series.info {
            let _ = ZONE_INFO.remove_label_values(&labels(&info));
        }
        for record in &series.records {
            let _ = RECORD_SET_INFO.remove_label_values(&labels(record));
        }
    }
    let _ = ZONE_RECORDS_SUM.remove_label_values(&[zone, kind]);
}

/// Count one Azure DNS facade call.
pub fn record_api_request(method: &str) {
    API_REQUEST_TOTAL.with_label_values(&[method]).inc();
}

/// Count one failed Azure DNS facade call.
pub fn record_api_error(method: &str) {
    API_REQUEST_ERRORS_TOTAL.with_label_values(&[method]).inc();
}

/// Record a finished reconciliation.
pub fn record_reconciliation(resource_type: &str, status: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a requeue operation.
pub fn record_requeue(resource_type: &str, reason: &str) {
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record that this replica acquired leadership.
pub fn record_leader_elected(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["acquired"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(1.0);
}

/// Record that this replica lost leadership.
pub fn record_leader_lost(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["lost"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(0.0);
}

/// Gather all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
