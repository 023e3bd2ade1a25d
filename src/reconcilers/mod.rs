// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of the Azure DNS zones of Cluster API workload clusters.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - `AzureCluster` objects and their owning `Cluster`
//! 2. **Snapshot** - Collapse both records, identities and annotations into a [`snapshot::ClusterSnapshot`]
//! 3. **Desired** - Build the record sets each zone should hold
//! 4. **Diff** - Compare against the records observed in Azure DNS
//! 5. **Apply** - Upsert and delete only what differs, then publish metrics
//!
//! # Available Reconcilers
//!
//! - [`reconcile`] / [`error_policy`] - Controller entry points per `AzureCluster`
//! - [`public_zone::reconcile_public_zone`] - Public `<cluster>.<base>` zone
//! - [`delegation::reconcile_delegation`] - NS delegation in the base zone
//! - [`private_zone::reconcile_private_zone`] - Private zones and their virtual network links
//!
//! # Example: Running the Controller
//!
//! ```rust,no_run
//! use cluster_dns_operator::context::Context;
//! use cluster_dns_operator::crd::AzureCluster;
//! use cluster_dns_operator::reconcilers::{error_policy, reconcile};
//! use futures::StreamExt;
//! use kube::runtime::{watcher, Controller};
//! use kube::Api;
//! use std::sync::Arc;
//!
//! async fn run(ctx: Arc<Context>) {
//!     let api: Api<AzureCluster> = Api::all(ctx.client.clone());
//!     Controller::new(api, watcher::Config::default())
//!         .run(reconcile, error_policy, ctx)
//!         .for_each(|_| futures::future::ready(()))
//!         .await;
//! }
//! ```

pub mod cluster;
pub mod delegation;
pub mod desired;
pub mod diff;
pub mod finalizers;
pub mod gateway;
pub mod pagination;
pub mod private_zone;
pub mod public_zone;
pub mod records;
pub mod retry;
pub mod snapshot;

pub use cluster::{error_policy, reconcile, ReconcileOutcome};
