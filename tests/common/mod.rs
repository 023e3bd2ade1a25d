// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use cluster_dns_operator::azure::arm::ArmDnsClient;
use cluster_dns_operator::azure::auth::StaticTokenCredential;
use cluster_dns_operator::azure::ZoneRef;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";
pub const TOKEN: &str = "test-token";

/// Client against a mock Resource Manager, authenticated with a fixed token.
pub fn arm_client(server: &MockServer) -> ArmDnsClient {
    ArmDnsClient::new(
        reqwest::Client::new(),
        &server.uri(),
        SUBSCRIPTION,
        Arc::new(StaticTokenCredential::new(TOKEN)),
    )
    .expect("mock server URI is a valid endpoint")
    .with_poll_interval(Duration::from_millis(10))
}

pub fn public_zone() -> ZoneRef {
    ZoneRef::public("test-cluster", "test-cluster.basedomain.io")
}

pub fn private_zone() -> ZoneRef {
    ZoneRef::private("mc", "test-cluster.basedomain.io")
}

/// Resource path of a public zone, optionally followed by child segments.
pub fn public_zone_path(children: &str) -> String {
    format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/test-cluster/providers/Microsoft.Network/dnsZones/test-cluster.basedomain.io{children}"
    )
}

pub fn private_zone_path(children: &str) -> String {
    format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/mc/providers/Microsoft.Network/privateDnsZones/test-cluster.basedomain.io{children}"
    )
}

/// Public zone resource as returned by Resource Manager.
pub fn zone_json(name_servers: &[&str]) -> Value {
    json!({
        "id": public_zone_path(""),
        "name": "test-cluster.basedomain.io",
        "type": "Microsoft.Network/dnszones",
        "location": "global",
        "tags": { "sigs.k8s.io_cluster-provider-azure_cluster_test-cluster": "owned" },
        "properties": {
            "maxNumberOfRecordSets": 10000,
            "numberOfRecordSets": 2,
            "nameServers": name_servers,
            "zoneType": "Public"
        }
    })
}

/// Public A record set as returned by Resource Manager.
pub fn a_record_json(name: &str, ttl: u32, ips: &[&str]) -> Value {
    let records: Vec<Value> = ips.iter().map(|ip| json!({ "ipv4Address": ip })).collect();
    json!({
        "name": name,
        "type": "Microsoft.Network/dnszones/A",
        "properties": {
            "TTL": ttl,
            "fqdn": format!("{name}.test-cluster.basedomain.io."),
            "provisioningState": "Succeeded",
            "ARecords": records
        }
    })
}

pub fn arm_error(code: &str, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message } })
}
