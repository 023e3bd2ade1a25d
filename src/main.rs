// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use cluster_dns_operator::{
    azure::arm::ArmClientFactory,
    config::OperatorConfig,
    constants::{
        DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_GRACE_SECS, HEALTH_SERVER_PATH,
        LEADER_LEASE_NAME, METRICS_SERVER_PATH, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::{AzureCluster, Cluster},
    labels::WATCH_FILTER_LABEL,
    metrics,
    reconcilers::{cluster::infrastructure_ref, error_policy, reconcile},
};
use futures::StreamExt;
use kube::{
    runtime::{controller, watcher, Controller},
    Api, Client,
};
use kube_lease_manager::LeaseManagerBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("cluster-dns-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_logging() {
    // Respects RUST_LOG if set, otherwise defaults to INFO level.
    // RUST_LOG_FORMAT=json switches to structured output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    init_logging();

    info!("Starting Cluster DNS Operator");
    debug!(?config, "Configuration loaded");
    config.validate()?;

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let factory = ArmClientFactory::new(&config.azure_endpoint, &config.azure_authority_host)?;
    let ctx = Arc::new(Context::new(client.clone(), config.clone(), Arc::new(factory))?);
    info!(zone = %ctx.base_zone, "Base zone configured");

    let identity = pod_identity();
    let leadership = if config.leader_elect {
        Some(acquire_leadership(client.clone(), &config, &identity).await?)
    } else {
        None
    };

    // The controller stops on SIGINT/SIGTERM; every other exit is fatal
    tokio::select! {
        () = run_controller(client, ctx) => {
            info!("Controller shut down");
            Ok(())
        }
        result = run_metrics_server(config.metrics_bind_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        () = leadership_lost(leadership) => {
            metrics::record_leader_lost(&identity);
            error!("CRITICAL: leader lease lost, exiting");
            anyhow::bail!("leader lease {LEADER_LEASE_NAME} lost")
        }
    }
}

/// Identity used for the leader lease.
fn pod_identity() -> String {
    std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("cluster-dns-operator-{:08x}", rand::random::<u32>()))
}

/// Block until this replica holds the leader lease.
async fn acquire_leadership(
    client: Client,
    config: &OperatorConfig,
    identity: &str,
) -> Result<watch::Receiver<bool>> {
    info!(
        lease = LEADER_LEASE_NAME,
        namespace = %config.leader_election_namespace,
        %identity,
        "Waiting for leader lease"
    );
    let manager = LeaseManagerBuilder::new(client, LEADER_LEASE_NAME)
        .with_namespace(&config.leader_election_namespace)
        .with_identity(identity)
        .with_duration(DEFAULT_LEASE_DURATION_SECS)
        .with_grace(DEFAULT_LEASE_GRACE_SECS)
        .build()
        .await?;
    let (mut leader, task) = manager.watch().await;
    // The lease keeps being renewed by the detached task
    drop(task);

    while !*leader.borrow_and_update() {
        leader.changed().await?;
    }
    metrics::record_leader_elected(identity);
    info!(%identity, "Acquired leader lease");
    Ok(leader)
}

/// Resolves when a held lease is lost; never resolves without leader election.
async fn leadership_lost(leadership: Option<watch::Receiver<bool>>) {
    let Some(mut leader) = leadership else {
        return futures::future::pending().await;
    };
    loop {
        if leader.changed().await.is_err() {
            warn!("Leader lease manager stopped");
            return;
        }
        if !*leader.borrow_and_update() {
            return;
        }
    }
}

/// Run the `AzureCluster` controller until shutdown.
async fn run_controller(client: Client, ctx: Arc<Context>) {
    let mut watcher_config = watcher::Config::default();
    if let Some(filter) = &ctx.config.watch_filter {
        let selector = format!("{WATCH_FILTER_LABEL}={filter}");
        info!(%selector, "Only reconciling labelled clusters");
        watcher_config = watcher_config.labels(&selector);
    }
    let concurrency = ctx.config.concurrency;
    info!(concurrency, "Starting AzureCluster controller");

    let azure_clusters = Api::<AzureCluster>::all(client.clone());
    let clusters = Api::<Cluster>::all(client);

    Controller::new(azure_clusters, watcher_config.clone())
        .with_config(controller::Config::default().concurrency(concurrency))
        .watches(clusters, watcher_config, |cluster: Cluster| {
            infrastructure_ref(&cluster)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(cluster = %object, ?action, "Reconciled"),
                Err(e) => debug!(error = %e, "Reconcile failed"),
            }
        })
        .await;
}

/// Serve `/metrics` and `/healthz`.
async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route(HEALTH_SERVER_PATH, get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Serving metrics");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
