//! `vibemq-server`: the broker host. Parses CLI/config/env, wires the
//! `vibemq-broker` core to a real `TcpListener`, mounts the `/health/`
//! and `/metrics/` sidecar, and owns graceful shutdown on Ctrl-C.
//!
//! Everything spec.md §1 calls "out of scope... through interfaces in
//! §6" lives in this crate: the accept-loop bootstrap, CLI/hosting glue,
//! and the HTTP observability endpoint are all ambient hosting concerns
//! the core library deliberately does not own.

mod cli;
mod config;
mod health;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vibemq_broker::Broker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_tracing(args.verbose);

    let server_config = config::load(&args)?;
    info!(
        port = server_config.broker.port,
        health_port = server_config.health_port,
        tls = server_config.broker.tls.is_some(),
        "starting vibemq-server"
    );

    let broker = Broker::new(server_config.broker)?;

    let health_router = health::router(Arc::clone(broker.monitor()));
    let health_listener =
        tokio::net::TcpListener::bind(("0.0.0.0", server_config.health_port)).await?;
    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health_router).await {
            error!(error = %e, "health sidecar exited");
        }
    });

    let broker_for_run = Arc::clone(&broker);
    let broker_task = tokio::spawn(async move {
        if let Err(e) = broker_for_run.run().await {
            error!(error = %e, "broker accept loop exited");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    broker.shutdown().await;
    health_task.abort();
    let _ = broker_task.await;

    Ok(())
}

/// Install the process-wide `tracing` subscriber. The `vibemq-broker`
/// library never does this itself (§7: "the core library never
/// initializes a subscriber itself") so embedding it elsewhere doesn't
/// fight over the global dispatcher.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
