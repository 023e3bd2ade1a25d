// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service principal authentication through the client factory.

mod common;

use cluster_dns_operator::azure::arm::ArmClientFactory;
use cluster_dns_operator::azure::{CloudIdentity, DnsClientFactory};
use cluster_dns_operator::dns_errors::DnsApiError;
use common::*;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn identity(secret: &str) -> CloudIdentity {
    CloudIdentity {
        tenant_id: "tenant-1".to_string(),
        client_id: "wc-client".to_string(),
        client_secret: secret.to_string(),
        subscription_id: SUBSCRIPTION.to_string(),
    }
}

#[tokio::test]
async fn token_is_acquired_once_and_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=wc-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "sp-token"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(public_zone_path("")))
        .and(header("authorization", "Bearer sp-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_json(&["ns1-01.azure-dns.com."])))
        .expect(2)
        .mount(&server)
        .await;

    let factory = ArmClientFactory::new(server.uri(), server.uri()).expect("factory");
    let first = factory.client(&identity("secret")).expect("client");
    let second = factory.client(&identity("secret")).expect("client");

    first.get_zone(&public_zone()).await.expect("zone");
    second.get_zone(&public_zone()).await.expect("zone");
}

#[tokio::test]
async fn rejected_secret_is_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let factory = ArmClientFactory::new(server.uri(), server.uri()).expect("factory");
    let client = factory.client(&identity("wrong")).expect("client");

    let err = client
        .get_zone(&public_zone())
        .await
        .expect_err("token rejected");

    match err {
        DnsApiError::AuthFailed { message } => assert!(message.contains("invalid_client")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn invalid_endpoint_is_rejected() {
    let factory = ArmClientFactory::new("not a url", "https://login.example").expect("factory");
    assert!(factory.client(&identity("secret")).is_err());
}
