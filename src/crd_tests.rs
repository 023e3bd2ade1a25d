// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use serde_json::json;

    #[test]
    fn test_azure_cluster_decodes_consumed_fields() {
        let cluster: AzureCluster = serde_json::from_value(json!({
            "apiVersion": "infrastructure.cluster.x-k8s.io/v1beta1",
            "kind": "AzureCluster",
            "metadata": {
                "name": "test-cluster",
                "namespace": "org-acme",
                "annotations": {"cluster-dns-operator.io/bastion-ip": "192.168.2.60"}
            },
            "spec": {
                "resourceGroup": "test-cluster",
                "location": "westeurope",
                "subscriptionID": "sub-1",
                "identityRef": {"kind": "AzureClusterIdentity", "name": "wc-identity", "namespace": "org-acme"},
                "controlPlaneEndpoint": {"host": "8.8.8.8", "port": 6443},
                "additionalTags": {"team": "dns"},
                "networkSpec": {
                    "vnet": {"name": "test-cluster-vnet"},
                    "apiServerLB": {"type": "Public"},
                    "subnets": [{
                        "name": "node-subnet",
                        "privateEndpoints": [{
                            "name": "wc-api-privatelink-privateendpoint",
                            "privateIPAddresses": ["10.0.0.4"]
                        }]
                    }]
                },
                "unknownUpstreamField": {"ignored": true}
            },
            "status": {
                "ready": true,
                "conditions": [{"type": "LoadBalancersReady", "status": "True"}]
            }
        }))
        .expect("AzureCluster decodes");

        assert_eq!(cluster.spec.subscription_id, "sub-1");
        assert_eq!(cluster.spec.network_spec.vnet.name, "test-cluster-vnet");
        assert_eq!(
            cluster.spec.network_spec.subnets[0].private_endpoints[0].private_ip_addresses,
            vec!["10.0.0.4".to_string()]
        );
        assert_eq!(
            cluster
                .spec
                .network_spec
                .api_server_lb
                .and_then(|lb| lb.r#type)
                .as_deref(),
            Some("Public")
        );
        let status = cluster.status.expect("status");
        assert!(condition_is_true(&status.conditions, "LoadBalancersReady"));
    }

    #[test]
    fn test_cluster_phase_and_endpoint() {
        let cluster: Cluster = serde_json::from_value(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "Cluster",
            "metadata": {"name": "test-cluster", "namespace": "org-acme"},
            "spec": {"controlPlaneEndpoint": {"host": "api.example.com", "port": 443}},
            "status": {"phase": "Provisioned", "infrastructureReady": true}
        }))
        .expect("Cluster decodes");

        assert_eq!(
            cluster.status.and_then(|s| s.phase).as_deref(),
            Some("Provisioned")
        );
        assert_eq!(
            cluster.spec.control_plane_endpoint.map(|e| e.host).as_deref(),
            Some("api.example.com")
        );
    }

    #[test]
    fn test_identity_decodes_capitalized_ids() {
        let identity: AzureClusterIdentity = serde_json::from_value(json!({
            "apiVersion": "infrastructure.cluster.x-k8s.io/v1beta1",
            "kind": "AzureClusterIdentity",
            "metadata": {"name": "wc-identity", "namespace": "org-acme"},
            "spec": {
                "type": "ServicePrincipal",
                "tenantID": "tenant-1",
                "clientID": "client-1",
                "clientSecret": {"name": "wc-identity-secret", "namespace": "org-acme"}
            }
        }))
        .expect("identity decodes");

        assert_eq!(identity.spec.tenant_id, "tenant-1");
        assert_eq!(identity.spec.client_id, "client-1");
        assert!(SECRET_IDENTITY_TYPES.contains(&identity.spec.r#type.as_str()));
    }

    #[test]
    fn test_condition_must_be_true() {
        let conditions = vec![Condition {
            r#type: "LoadBalancersReady".to_string(),
            status: "False".to_string(),
            ..Condition::default()
        }];
        assert!(!condition_is_true(&conditions, "LoadBalancersReady"));
        assert!(!condition_is_true(&[], "LoadBalancersReady"));
    }

    #[test]
    fn test_empty_endpoint() {
        assert!(ApiEndpoint::default().is_empty());
        assert!(!ApiEndpoint {
            host: "8.8.8.8".to_string(),
            port: 6443
        }
        .is_empty());
    }
}
