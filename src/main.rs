// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use kube::Client;
use shadow_operator::{
    config::OperatorConfig,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    http,
    reconcilers::run_pass,
    store::KubeStore,
};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("shadow-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
/// Text format: timestamp file:line LEVEL message
fn init_tracing() {
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
    init_tracing();
    config.validate()?;

    info!(
        resync_interval_secs = config.resync_interval,
        request_timeout_secs = config.request_timeout,
        workers = config.workers,
        canary_retries = config.canary_retries,
        metrics_address = %config.metrics_address,
        canary_suffix = ?config.canary_suffix,
        "Starting shadow service operator"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("initializing Kubernetes client")?;
    let store = Arc::new(KubeStore::new(client, config.request_timeout()));
    let ctx = Arc::new(Context::new(store, config.clone()));

    let shutdown = CancellationToken::new();
    let ready = CancellationToken::new();

    let mut metrics_server = tokio::spawn(http::serve(
        config.metrics_address,
        Arc::new(http::State::new(ready.clone())),
        shutdown.clone(),
    ));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => info!("Shutdown signal received, finishing current pass"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signals"),
            }
            shutdown.cancel();
        }
    });

    tokio::select! {
        () = run_resync_loop(Arc::clone(&ctx), ready, shutdown.clone()) => {}
        joined = &mut metrics_server => {
            shutdown.cancel();
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", joined);
            joined??;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }

    shutdown.cancel();
    match metrics_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Metrics server stopped with an error"),
        Err(e) => warn!(error = %e, "Metrics server task failed"),
    }

    info!("Shadow service operator stopped");
    Ok(())
}

/// Run a reconciliation pass every resync interval until `shutdown` fires.
///
/// `ready` is cancelled after the first pass that ran to completion.
async fn run_resync_loop(ctx: Arc<Context>, ready: CancellationToken, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(ctx.config.resync_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        match run_pass(Arc::clone(&ctx), shutdown.child_token()).await {
            Ok(report) if !report.cancelled => ready.cancel(),
            Ok(_) => debug!("Reconciliation pass cancelled"),
            Err(e) => error!(error = %e, "Reconciliation pass failed"),
        }
    }
}

/// Wait for Ctrl-C or, on Unix, SIGTERM.
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
