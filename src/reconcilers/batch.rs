// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! One reconciliation pass over every `ShadowService` in the cluster.
//!
//! A pass:
//!
//! 1. lists all `ShadowService` objects (with retries)
//! 2. registers each service name with the shadow canary, pruning entries left over from a
//!    previous run on the first successful pass
//! 3. runs two stages concurrently, each a producer feeding a bounded queue drained by a
//!    worker pool:
//!    - **clone**: searcher → `(ShadowService, source)` jobs → cloner
//!    - **gc**: deleter scan → deletable shadow workloads → deleter
//! 4. unregisters canary entries whose `ShadowService` vanished or changed service
//!
//! Per-item failures are logged and counted in the [`PassReport`]; they never abort the
//! pass. Cancelling the token stops the producers and makes workers quit after the item
//! they are processing.

use super::cloner::clone_shadow;
use super::deleter::{delete, find_deletable, Deletable};
use super::retry::{default_backoff, retry_store_call};
use super::searcher::search;
use crate::constants::{KIND_SHADOW_SERVICE, LIST_RETRY_ATTEMPTS, WORK_QUEUE_CAPACITY};
use crate::context::Context;
use crate::crd::ShadowService;
use crate::errors::ShadowError;
use crate::metrics;
use crate::workload::Workload;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Summary of one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// `ShadowService` objects listed
    pub shadow_services: usize,
    /// Shadow services whose source workload was not found (or was ambiguous)
    pub sources_missing: usize,
    /// Shadows created, updated or confirmed unchanged
    pub cloned: usize,
    /// Shadow services whose search or clone failed
    pub clone_failures: usize,
    /// Shadow workloads garbage collected
    pub deleted: usize,
    /// Shadow workloads (or their sub-resources) that could not be removed
    pub delete_failures: usize,
    /// Canary registrations or removals that failed
    pub canary_failures: usize,
    /// Whether the pass was cut short by cancellation
    pub cancelled: bool,
}

/// A source workload paired with the `ShadowService` that mirrors it.
#[derive(Clone, Debug)]
pub struct CloneJob {
    pub shadow_service: ShadowService,
    pub source: Workload,
}

#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct SearchTally {
    missing: usize,
    failed: usize,
}

/// Drain `rx` with `workers` concurrent tasks, counting handler successes and failures.
///
/// Returns once the queue is closed and empty, or as soon as `cancel` fires.
async fn run_pool<T, F, Fut>(
    stage: &'static str,
    workers: usize,
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
    handler: F,
) -> Tally
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let rx = Arc::new(Mutex::new(rx));
    let mut tasks = JoinSet::new();

    for worker in 0..workers.max(1) {
        let rx = Arc::clone(&rx);
        let cancel = cancel.clone();
        let handler = handler.clone();
        tasks.spawn(async move {
            let mut tally = Tally::default();
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    item = async { rx.lock().await.recv().await } => item,
                };
                let Some(item) = next else { break };
                if handler(item).await {
                    tally.succeeded += 1;
                } else {
                    tally.failed += 1;
                }
            }
            debug!(stage, worker, "Worker finished");
            tally
        });
    }
    // Producers see a closed queue once every worker has exited.
    drop(rx);

    let mut total = Tally::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(tally) => {
                total.succeeded += tally.succeeded;
                total.failed += tally.failed;
            }
            Err(e) => {
                error!(stage, error = %e, "Worker task panicked");
                total.failed += 1;
            }
        }
    }
    total
}

/// Search the source of every shadow service and queue a clone job for each one found.
async fn produce_clone_jobs(
    ctx: &Context,
    shadow_services: &[ShadowService],
    tx: mpsc::Sender<CloneJob>,
    cancel: &CancellationToken,
) -> SearchTally {
    let mut tally = SearchTally::default();
    for shadow_service in shadow_services {
        if cancel.is_cancelled() {
            break;
        }
        match search(ctx.store.as_ref(), shadow_service).await {
            Ok(Some(source)) => {
                let job = CloneJob {
                    shadow_service: shadow_service.clone(),
                    source,
                };
                if tx.send(job).await.is_err() {
                    debug!("Clone queue closed, stopping search");
                    break;
                }
            }
            Ok(None) => tally.missing += 1,
            Err(e) => {
                metrics::record_error(KIND_SHADOW_SERVICE, e.category());
                warn!(
                    shadow_service = %shadow_service.key(),
                    error = %e,
                    "Failed to search source workload"
                );
                tally.failed += 1;
            }
        }
    }
    tally
}

async fn clone_one(ctx: &Context, job: CloneJob) -> bool {
    let key = job.shadow_service.key();
    match clone_shadow(ctx.store.as_ref(), &ctx.naming, &job.source, &job.shadow_service).await {
        Ok(outcome) => {
            debug!(
                shadow_service = %key,
                shadow = %outcome.shadow,
                workload = outcome.workload.as_str(),
                "Shadow workload reconciled"
            );
            true
        }
        Err(e @ ShadowError::Validation { .. }) => {
            metrics::record_error(KIND_SHADOW_SERVICE, e.category());
            warn!(shadow_service = %key, source = %job.source.key(), error = %e, "Skipping invalid shadow service");
            false
        }
        Err(e) => {
            metrics::record_error(KIND_SHADOW_SERVICE, e.category());
            error!(shadow_service = %key, source = %job.source.key(), error = %e, "Failed to clone shadow workload");
            false
        }
    }
}

async fn delete_one(ctx: &Context, deletable: Deletable) -> bool {
    let shadow = deletable.workload.key();
    match delete(ctx.store.as_ref(), &deletable.workload).await {
        Ok(report) => {
            info!(
                kind = %deletable.workload.kind(),
                shadow = %shadow,
                reason = ?deletable.reason,
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "Garbage collected shadow workload"
            );
            report.failed.is_empty()
        }
        Err(e) => {
            error!(shadow = %shadow, error = %e, "Failed to garbage collect shadow workload");
            false
        }
    }
}

/// Register every active service with the canary; prune leftovers on the first pass.
async fn activate_canary(
    ctx: &Context,
    active: &BTreeSet<(String, String)>,
    report: &mut PassReport,
) {
    for (key, service) in active {
        if let Err(e) = ctx.registrar.on_activate(key, service).await {
            metrics::record_error("ServiceCanary", e.category());
            warn!(shadow_service = %key, service = %service, error = %e, "Failed to register service with shadow canary");
            report.canary_failures += 1;
        }
    }

    if ctx.canary_pruned.load(Ordering::Acquire) {
        return;
    }
    let services: BTreeSet<String> = active.iter().map(|(_, service)| service.clone()).collect();
    match ctx.registrar.prune(&services).await {
        Ok(()) => ctx.canary_pruned.store(true, Ordering::Release),
        Err(e) => {
            metrics::record_error("ServiceCanary", e.category());
            warn!(error = %e, "Failed to prune shadow canary, retrying next pass");
            report.canary_failures += 1;
        }
    }
}

/// Unregister tracked pairs whose `ShadowService` is gone or now targets another service.
async fn deactivate_canary(
    ctx: &Context,
    active: &BTreeSet<(String, String)>,
    report: &mut PassReport,
) {
    for (key, service) in ctx.registrar.tracked() {
        if active.contains(&(key.clone(), service.clone())) {
            continue;
        }
        if let Err(e) = ctx.registrar.on_deactivate(&key, &service).await {
            metrics::record_error("ServiceCanary", e.category());
            warn!(shadow_service = %key, service = %service, error = %e, "Failed to remove service from shadow canary");
            report.canary_failures += 1;
        }
    }
}

/// Run one reconciliation pass.
///
/// # Errors
///
/// Returns [`ShadowError::Store`] only when the `ShadowService` objects cannot be listed;
/// nothing else aborts a pass.
pub async fn run_pass(
    ctx: Arc<Context>,
    cancel: CancellationToken,
) -> Result<PassReport, ShadowError> {
    let start = Instant::now();
    let mut report = PassReport::default();

    let listed = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = retry_store_call(
            || ctx.store.list_shadow_services(),
            "list ShadowService",
            default_backoff(),
            LIST_RETRY_ATTEMPTS,
        ) => Some(result),
    };
    let shadow_services = match listed {
        None => {
            report.cancelled = true;
            metrics::record_pass(start.elapsed(), true);
            return Ok(report);
        }
        Some(Ok(shadow_services)) => shadow_services,
        Some(Err(e)) => {
            metrics::record_error(KIND_SHADOW_SERVICE, e.category());
            return Err(ShadowError::store("list", KIND_SHADOW_SERVICE, "", "*", e));
        }
    };
    report.shadow_services = shadow_services.len();
    metrics::set_shadow_services_active(shadow_services.len());

    let active: BTreeSet<(String, String)> = shadow_services
        .iter()
        .map(|svc| (svc.key(), svc.spec.service_name.clone()))
        .collect();
    if !cancel.is_cancelled() {
        activate_canary(&ctx, &active, &mut report).await;
    }

    if !cancel.is_cancelled() {
        let workers = ctx.config.workers;

        let (clone_tx, clone_rx) = mpsc::channel(WORK_QUEUE_CAPACITY);
        let clone_handler = {
            let ctx = Arc::clone(&ctx);
            move |job: CloneJob| {
                let ctx = Arc::clone(&ctx);
                async move { clone_one(&ctx, job).await }
            }
        };
        let clone_stage = async {
            futures::join!(
                produce_clone_jobs(&ctx, &shadow_services, clone_tx, &cancel),
                run_pool("clone", workers, clone_rx, cancel.clone(), clone_handler),
            )
        };

        let (gc_tx, gc_rx) = mpsc::channel(WORK_QUEUE_CAPACITY);
        let gc_handler = {
            let ctx = Arc::clone(&ctx);
            move |deletable: Deletable| {
                let ctx = Arc::clone(&ctx);
                async move { delete_one(&ctx, deletable).await }
            }
        };
        let gc_stage = async {
            futures::join!(
                find_deletable(ctx.store.as_ref(), &shadow_services, &ctx.naming, gc_tx),
                run_pool("gc", workers, gc_rx, cancel.clone(), gc_handler),
            )
        };

        let ((searched, cloned), (scanned, collected)) = futures::join!(clone_stage, gc_stage);

        report.sources_missing = searched.missing;
        report.cloned = cloned.succeeded;
        report.clone_failures = searched.failed + cloned.failed;
        report.deleted = collected.succeeded;
        report.delete_failures = collected.failed;
        if let Err(e) = scanned {
            metrics::record_error("workloads", e.category());
            warn!(error = %e, "Garbage collection scan failed");
            report.delete_failures += 1;
        }
    }

    if !cancel.is_cancelled() {
        deactivate_canary(&ctx, &active, &mut report).await;
    }

    report.cancelled = cancel.is_cancelled();
    let elapsed = start.elapsed();
    metrics::record_pass(elapsed, report.cancelled);
    info!(
        shadow_services = report.shadow_services,
        sources_missing = report.sources_missing,
        cloned = report.cloned,
        clone_failures = report.clone_failures,
        deleted = report.deleted,
        delete_failures = report.delete_failures,
        canary_failures = report.canary_failures,
        cancelled = report.cancelled,
        elapsed_ms = elapsed.as_millis(),
        "Reconciliation pass finished"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod batch_tests;
