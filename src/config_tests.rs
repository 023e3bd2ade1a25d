// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::OperatorConfig;
    use crate::dns_errors::ErrorKind;
    use clap::Parser;

    const REQUIRED: [&str; 13] = [
        "cluster-dns-operator",
        "--base-domain",
        "basedomain.io",
        "--base-domain-resource-group",
        "root-dns-zone",
        "--base-domain-subscription-id",
        "sub-1",
        "--base-domain-tenant-id",
        "tenant-1",
        "--base-domain-client-id",
        "client-1",
        "--base-domain-client-secret",
        "s3cret",
    ];

    fn parse(extra: &[&str]) -> OperatorConfig {
        OperatorConfig::try_parse_from(REQUIRED.iter().chain(extra.iter()))
            .expect("arguments parse")
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.metrics_bind_address.to_string(), "0.0.0.0:8080");
        assert_eq!(config.gateway_namespace, "envoy-gateway-system");
        assert_eq!(config.reconcile_timeout, 300);
        assert_eq!(config.concurrency, 4);
        assert!(!config.leader_elect);
        assert!(config.watch_filter.is_none());
        assert!(config.management_cluster_name.is_none());
        assert_eq!(config.azure_endpoint, "https://management.azure.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_domain_identity() {
        let identity = parse(&[]).base_domain_identity();
        assert_eq!(identity.tenant_id, "tenant-1");
        assert_eq!(identity.client_id, "client-1");
        assert_eq!(identity.subscription_id, "sub-1");
        assert_eq!(identity.client_secret, "s3cret");
    }

    #[test]
    fn test_empty_credentials_are_invalid() {
        let mut config = parse(&[]);
        config.base_domain_client_secret = "  ".to_string();
        let err = config.validate().expect_err("empty secret is invalid");
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("--base-domain-client-secret"));
    }

    #[test]
    fn test_dotted_base_domain_is_invalid() {
        let mut config = parse(&[]);
        config.base_domain = "basedomain.io.".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let config = parse(&["--reconcile-timeout", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_endpoint_is_invalid() {
        let config = parse(&["--azure-endpoint", "not a url"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", parse(&[]));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("basedomain.io"));
    }

    #[test]
    fn test_missing_base_domain_fails_to_parse() {
        assert!(OperatorConfig::try_parse_from(["cluster-dns-operator"]).is_err());
    }
}
