// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP endpoints for Prometheus scraping and health probes.
//!
//! - `GET /metrics` - every metric in the operator's registry, text exposition format
//! - `GET /healthz` - `200 Ok` once the first reconciliation pass has finished,
//!   `503 NotReady` before that

use crate::constants::{HEALTH_SERVER_PATH, METRICS_SERVER_PATH};
use crate::metrics;
use axum::extract::State as AxumState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct State {
    ready: CancellationToken,
}

impl State {
    /// `ready` is cancelled by the driver once the first pass completes.
    #[must_use]
    pub fn new(ready: CancellationToken) -> Self {
        Self { ready }
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        if self.ready.is_cancelled() {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }
}

/// Result of the health probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
}

impl IntoResponse for Readiness {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Readiness::Ready => (StatusCode::OK, "Ok"),
            Readiness::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "NotReady"),
        };
        (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
    }
}

/// Build the router serving `/metrics` and `/healthz`.
pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route(HEALTH_SERVER_PATH, get(healthz_handler))
        .with_state(state)
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz_handler(AxumState(state): AxumState<Arc<State>>) -> Readiness {
    state.readiness()
}

/// Serve the router on `addr` until `cancel` fires.
///
/// # Errors
///
/// Returns an I/O error when the address cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<State>,
    cancel: CancellationToken,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "Metrics server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
