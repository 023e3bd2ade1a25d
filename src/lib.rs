// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Cluster DNS Operator - Azure DNS for Cluster API workload clusters
//!
//! A Kubernetes operator that keeps the Azure DNS zones of Cluster API workload clusters in
//! sync with the clusters themselves.
//!
//! ## Overview
//!
//! For every `AzureCluster` the operator maintains:
//!
//! - A public zone `<cluster>.<base domain>` with `api`, `bastion`, wildcard and gateway records
//! - The NS delegation of that zone in the shared base zone
//! - Private zones linked to virtual networks, so the management cluster can reach private
//!   API servers and workload clusters can reach the management cluster's ingress
//!
//! Every reconcile diffs the desired record sets against what Azure holds and only writes
//! the difference. Records the operator does not manage are never touched.
//!
//! ## Modules
//!
//! - [`crd`] - Typed views of the Cluster API records the operator reads
//! - [`records`] - Record model shared by all zones
//! - [`reconcilers`] - Desired state, diffing and reconciliation of each zone kind
//! - [`azure`] - Azure DNS client facade and its Resource Manager implementation
//! - [`context`] - Shared controller context
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use cluster_dns_operator::records::{Op, RecordData, RecordSet};
//! use std::net::Ipv4Addr;
//!
//! let api = RecordSet::owned("api", 300, RecordData::A(vec![Ipv4Addr::new(20, 1, 2, 3)]));
//! assert_eq!(Op::Upsert(api).to_string(), "upsert A api ttl=300 [20.1.2.3]");
//! ```

pub mod azure;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod dns_errors;
pub mod http_errors;
pub mod labels;
pub mod metrics;
pub mod records;
pub mod reconcilers;
pub mod status_reasons;
