// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, annotation and finalizer constants.
//!
//! This module defines the upstream cluster-lifecycle labels the operator consumes and the
//! operator-specific annotations users set on infrastructure clusters.

// ============================================================================
// Cluster API Labels
// ============================================================================

/// Label carrying the name of the owning `Cluster`
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label used to shard clusters between controller deployments
pub const WATCH_FILTER_LABEL: &str = "cluster.x-k8s.io/watch-filter";

// ============================================================================
// Operator Annotations (set on the infrastructure cluster)
// ============================================================================

/// Annotation holding the public IPv4 of the cluster bastion host
pub const BASTION_IP_ANNOTATION: &str = "cluster-dns-operator.io/bastion-ip";

/// Annotation overriding the private IPv4 of the workload API endpoint
pub const PRIVATE_API_IP_ANNOTATION: &str = "cluster-dns-operator.io/private-api-ip";

/// Annotation holding the private IPv4 of the management cluster ingress
pub const PRIVATE_INGRESS_IP_ANNOTATION: &str = "cluster-dns-operator.io/private-ingress-ip";

// ============================================================================
// Gateway Service Annotations (set on workload cluster services)
// ============================================================================

/// Annotation opting a gateway service into DNS management
pub const GATEWAY_MANAGED_ANNOTATION: &str = "cluster-dns-operator.io/managed";

/// Value of [`GATEWAY_MANAGED_ANNOTATION`] that opts a service in
pub const GATEWAY_MANAGED_VALUE: &str = "managed";

/// Annotation listing the hostnames served by a gateway service (comma separated)
pub const GATEWAY_HOSTNAME_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/hostname";

// ============================================================================
// Cloud Resource Tags and Record Metadata
// ============================================================================

/// Tag marking cloud resources owned by a cluster (`<prefix><clusterName>=owned`)
pub const CLUSTER_OWNED_TAG_PREFIX: &str = "sigs.k8s.io_cluster-provider-azure_cluster_";

/// Value of the cluster ownership tag
pub const CLUSTER_OWNED_TAG_VALUE: &str = "owned";

/// Tag on virtual network links naming the client id of the identity that created them
pub const LINK_OWNER_TAG: &str = "cluster-dns-operator.io_owner-client-id";

/// Record-set metadata key naming the writer of the record
pub const RECORD_MANAGED_BY_KEY: &str = "managedBy";

/// Record-set metadata key naming where a record was derived from
pub const RECORD_SOURCE_KEY: &str = "source";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer placed on infrastructure clusters before DNS is first mutated
pub const FINALIZER_DNS_RECORDS: &str = "cluster-dns-operator.io/dns-records";
