// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the cluster DNS operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Upstream API Constants
// ============================================================================

/// API group of the cluster-lifecycle `Cluster` resource
pub const CLUSTER_API_GROUP: &str = "cluster.x-k8s.io";

/// API group of the Azure infrastructure resources (`AzureCluster`, `AzureClusterIdentity`)
pub const INFRASTRUCTURE_API_GROUP: &str = "infrastructure.cluster.x-k8s.io";

/// Kind name for the infrastructure cluster this operator reconciles
pub const KIND_AZURE_CLUSTER: &str = "AzureCluster";

/// Kind name for the owning cluster-lifecycle record
pub const KIND_CLUSTER: &str = "Cluster";

/// Lifecycle phase a `Cluster` must report before DNS is reconciled
pub const CLUSTER_PHASE_PROVISIONED: &str = "Provisioned";

/// Infrastructure condition gating DNS reconciliation
pub const CONDITION_LOAD_BALANCERS_READY: &str = "LoadBalancersReady";

/// API load balancer type for clusters with a private API endpoint
pub const API_SERVER_LB_TYPE_INTERNAL: &str = "Internal";

// ============================================================================
// Azure Resource Manager Constants
// ============================================================================

/// Default Azure Resource Manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Default Microsoft Entra authority host
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// OAuth2 scope requested for Resource Manager tokens
pub const ARM_TOKEN_SCOPE: &str = "https://management.azure.com/.default";

/// API version for public DNS zones and their record sets
pub const PUBLIC_DNS_API_VERSION: &str = "2018-05-01";

/// API version for private DNS zones, record sets and virtual network links
pub const PRIVATE_DNS_API_VERSION: &str = "2020-06-01";

/// Location every DNS zone is created in
pub const ZONE_LOCATION_GLOBAL: &str = "global";

/// Tokens are refreshed this long before they expire
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Interval between long-running operation polls when the API gives no `Retry-After`
pub const LRO_DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Upper bound for a single long-running operation poll interval
pub const LRO_MAX_POLL_INTERVAL_SECS: u64 = 30;

/// Timeout for a single HTTP request to Resource Manager
pub const ARM_HTTP_TIMEOUT_SECS: u64 = 30;

/// Upper bound on `nextLink` pages followed by one list call
pub const ARM_MAX_LIST_PAGES: usize = 1000;

// ============================================================================
// DNS Record Constants
// ============================================================================

/// TTL of every record set written into a per-cluster zone (5 minutes)
pub const DEFAULT_RECORD_TTL_SECS: u32 = 300;

/// TTL of the NS delegation record written into the base zone
pub const DELEGATION_TTL_SECS: u32 = 300;

/// Label of the zone apex
pub const APEX_RECORD_NAME: &str = "@";

/// A records pointing at the API endpoint
pub const API_RECORD_NAME: &str = "api";

/// Second A record pointing at the API endpoint
pub const APISERVER_RECORD_NAME: &str = "apiserver";

/// A record pointing at the bastion host
pub const BASTION_RECORD_NAME: &str = "bastion";

/// Second A record pointing at the bastion host
pub const BASTION1_RECORD_NAME: &str = "bastion1";

/// Wildcard CNAME label
pub const WILDCARD_RECORD_NAME: &str = "*";

/// Ingress label, target of the wildcard CNAME and the private ingress A record
pub const INGRESS_RECORD_NAME: &str = "ingress";

/// Suffix of the management-cluster private endpoint exposing a workload API
pub const PRIVATE_LINK_ENDPOINT_SUFFIX: &str = "-api-privatelink-privateendpoint";

/// Suffix of the deterministic virtual network link name (`<resourceGroup>-vnet-link`)
pub const VNET_LINK_SUFFIX: &str = "-vnet-link";

/// Record-set metadata value identifying records written by this operator
pub const RECORD_OWNER: &str = "cluster-dns-operator";

/// Record-set metadata value identifying records derived from gateway services
pub const RECORD_SOURCE_GATEWAY: &str = "gateway";

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Requeue after a successful reconcile (5 minutes)
pub const RECONCILE_REQUEUE_SECS: u64 = 300;

/// Requeue while the cluster is not yet eligible for DNS (2 minutes)
pub const GATED_REQUEUE_SECS: u64 = 120;

/// Requeue after a soft failure such as missing workload connectivity (2 minutes)
pub const SOFT_FAILURE_REQUEUE_SECS: u64 = 120;

/// Initial requeue delay after a retryable reconcile failure
pub const ERROR_REQUEUE_INITIAL_SECS: u64 = 1;

/// Maximum requeue delay after repeated retryable reconcile failures (5 minutes)
pub const ERROR_REQUEUE_MAX_SECS: u64 = 300;

/// Default deadline for one reconcile
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 300;

/// Default number of clusters reconciled in parallel
pub const DEFAULT_CONCURRENCY: u16 = 4;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Name of the leader election lease
pub const LEADER_LEASE_NAME: &str = "cluster-dns-operator-leader";

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election grace period (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Page size for Kubernetes list operations
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

/// Name of the event reporter
pub const EVENT_REPORTER: &str = "cluster-dns-operator";

/// Default namespace holding gateway services in workload clusters
pub const DEFAULT_GATEWAY_NAMESPACE: &str = "envoy-gateway-system";

/// Key of the kubeconfig inside the `<cluster>-kubeconfig` secret
pub const KUBECONFIG_SECRET_KEY: &str = "value";

/// Suffix of the workload cluster kubeconfig secret
pub const KUBECONFIG_SECRET_SUFFIX: &str = "-kubeconfig";

/// Key of the client secret inside a service principal secret
pub const CLIENT_SECRET_KEY: &str = "clientSecret";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for liveness checks
pub const HEALTH_SERVER_PATH: &str = "/healthz";

/// Default bind address for metrics HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
