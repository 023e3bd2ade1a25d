// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Resource Manager client against a mock server.

mod common;

use cluster_dns_operator::azure::{DnsApi, VirtualNetworkLink};
use cluster_dns_operator::dns_errors::DnsApiError;
use cluster_dns_operator::records::{RecordData, RecordSet, RecordType};
use common::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_zone_returns_name_servers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(public_zone_path("")))
        .and(query_param("api-version", "2018-05-01"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_json(&[
            "ns1-01.azure-dns.com.",
            "ns2-01.azure-dns.net.",
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let zone = arm_client(&server)
        .get_zone(&public_zone())
        .await
        .expect("zone");

    assert_eq!(zone.name, "test-cluster.basedomain.io");
    assert_eq!(
        zone.name_servers,
        vec!["ns1-01.azure-dns.com.", "ns2-01.azure-dns.net."]
    );
    assert_eq!(zone.number_of_record_sets, Some(2));
}

#[tokio::test]
async fn list_record_sets_follows_next_link() {
    let server = MockServer::start().await;
    let next = format!("{}/page-2", server.uri());
    Mock::given(method("GET"))
        .and(path(public_zone_path("/recordsets")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                a_record_json("api", 300, &["20.1.2.3"]),
                {
                    "name": "_acme-challenge",
                    "type": "Microsoft.Network/dnszones/TXT",
                    "properties": { "TTL": 60, "TXTRecords": [{ "value": ["token"] }] }
                }
            ],
            "nextLink": next
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [a_record_json("bastion", 300, &["20.1.2.4"])]
        })))
        .mount(&server)
        .await;

    let records = arm_client(&server)
        .list_record_sets(&public_zone())
        .await
        .expect("records");

    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["api", "bastion"]);
    assert_eq!(records[0].ttl, Some(300));
    assert_eq!(
        records[0].data,
        Some(RecordData::A(vec![Ipv4Addr::new(20, 1, 2, 3)]))
    );
}

#[tokio::test]
async fn private_zone_records_use_private_casing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(private_zone_path("/ALL")))
        .and(query_param("api-version", "2020-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "name": "apiserver",
                "type": "Microsoft.Network/privateDnsZones/A",
                "properties": { "ttl": 300, "aRecords": [{ "ipv4Address": "10.0.0.4" }] }
            }]
        })))
        .mount(&server)
        .await;

    let records = arm_client(&server)
        .list_record_sets(&private_zone())
        .await
        .expect("records");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_type, RecordType::A);
    assert_eq!(
        records[0].data,
        Some(RecordData::A(vec![Ipv4Addr::new(10, 0, 0, 4)]))
    );
}

#[tokio::test]
async fn missing_zone_is_parent_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(public_zone_path("/recordsets")))
        .respond_with(ResponseTemplate::new(404).set_body_json(arm_error(
            "ParentResourceNotFound",
            "Can not perform requested operation on nested resource. Parent resource 'test-cluster.basedomain.io' not found.",
        )))
        .mount(&server)
        .await;

    let err = arm_client(&server)
        .list_record_sets(&public_zone())
        .await
        .expect_err("zone missing");

    assert!(err.is_not_found());
    assert!(err.is_parent_not_found());
}

#[tokio::test]
async fn throttling_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(public_zone_path("")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(public_zone_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_json(&["ns1-01.azure-dns.com."])))
        .expect(1)
        .mount(&server)
        .await;

    let zone = arm_client(&server)
        .get_zone(&public_zone())
        .await
        .expect("zone after retry");

    assert_eq!(zone.name_servers.len(), 1);
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(public_zone_path("")))
        .respond_with(ResponseTemplate::new(403).set_body_json(arm_error(
            "AuthorizationFailed",
            "The client does not have authorization to perform action",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let err = arm_client(&server)
        .get_zone(&public_zone())
        .await
        .expect_err("forbidden");

    assert!(matches!(err, DnsApiError::AuthFailed { .. }));
}

#[tokio::test]
async fn upsert_record_set_sends_public_casing() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(public_zone_path("/A/api")))
        .and(body_partial_json(json!({
            "properties": {
                "TTL": 300,
                "ARecords": [{ "ipv4Address": "20.1.2.3" }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(a_record_json("api", 300, &["20.1.2.3"])))
        .expect(1)
        .mount(&server)
        .await;

    let record = RecordSet::owned("api", 300, RecordData::A(vec![Ipv4Addr::new(20, 1, 2, 3)]));
    arm_client(&server)
        .create_or_update_record_set(&public_zone(), &record)
        .await
        .expect("upserted");
}

#[tokio::test]
async fn zone_creation_polls_async_operation() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/zone-1", server.uri());
    Mock::given(method("PUT"))
        .and(path(public_zone_path("")))
        .and(body_partial_json(json!({ "location": "global" })))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Azure-AsyncOperation", operation.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/zone-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "InProgress" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/zone-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Succeeded" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(public_zone_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_json(&["ns1-01.azure-dns.com."])))
        .expect(1)
        .mount(&server)
        .await;

    let tags = BTreeMap::from([(
        "sigs.k8s.io_cluster-provider-azure_cluster_test-cluster".to_string(),
        "owned".to_string(),
    )]);
    let zone = arm_client(&server)
        .create_or_update_zone(&public_zone(), &tags)
        .await
        .expect("created");

    assert_eq!(zone.name_servers, vec!["ns1-01.azure-dns.com."]);
}

#[tokio::test]
async fn failed_async_operation_is_rejected() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/delete-1", server.uri());
    Mock::given(method("DELETE"))
        .and(path(public_zone_path("")))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Azure-AsyncOperation", operation.as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/delete-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Failed",
            "error": { "code": "ZoneHasRecords", "message": "zone still delegated" }
        })))
        .mount(&server)
        .await;

    let err = arm_client(&server)
        .delete_zone(&public_zone())
        .await
        .expect_err("operation failed");

    match err {
        DnsApiError::Rejected { code, .. } => assert_eq!(code, "ZoneHasRecords"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn virtual_network_links_round_trip() {
    let server = MockServer::start().await;
    let network = "/subscriptions/sub/resourceGroups/mc/providers/Microsoft.Network/virtualNetworks/mc-vnet";
    Mock::given(method("GET"))
        .and(path(private_zone_path("/virtualNetworkLinks")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "name": "mc-vnet-link",
                "tags": { "cluster-dns-operator.io_owner-client-id": "mc-client" },
                "properties": {
                    "virtualNetwork": { "id": network },
                    "registrationEnabled": false,
                    "provisioningState": "Succeeded"
                }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(private_zone_path("/virtualNetworkLinks/mc-vnet-link")))
        .and(body_partial_json(json!({
            "properties": {
                "virtualNetwork": { "id": network },
                "registrationEnabled": false
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "mc-vnet-link" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = arm_client(&server);
    let links = client
        .list_virtual_network_links(&private_zone())
        .await
        .expect("links");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].network_id, network);
    assert_eq!(
        links[0].tags.get("cluster-dns-operator.io_owner-client-id").map(String::as_str),
        Some("mc-client")
    );

    let link = VirtualNetworkLink {
        name: "mc-vnet-link".to_string(),
        network_id: network.to_string(),
        registration_enabled: false,
        tags: BTreeMap::new(),
        provisioning_state: None,
    };
    client
        .create_or_update_virtual_network_link(&private_zone(), &link)
        .await
        .expect("link upserted");
}

#[tokio::test]
async fn delete_of_missing_record_set_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(public_zone_path("/CNAME/ingress")))
        .respond_with(ResponseTemplate::new(404).set_body_json(arm_error(
            "NotFound",
            "The resource record 'ingress' does not exist",
        )))
        .mount(&server)
        .await;

    let err = arm_client(&server)
        .delete_record_set(&public_zone(), "ingress", RecordType::CNAME)
        .await
        .expect_err("missing");

    assert!(err.is_not_found());
    assert!(!err.is_parent_not_found());
}
