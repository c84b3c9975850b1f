//! Scheduler loop
//!
//! Continuously discovers candidates, filters them through the dedup oracle,
//! builds one pipeline per survivor and drives the pending queue through the
//! worker pool in capped batches. Each batch fully drains before the next one
//! is dispatched; when nothing is pending the loop sleeps for the poll
//! interval, a sleep that shutdown cuts short.

use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use xcavator_core::Pipeline;

use super::pool::{BatchSummary, WorkerPool};
use crate::config::{DedupFailurePolicy, SchedulerSettings};
use crate::repository::{DedupOracle, Discoverer};
use crate::tasks::PipelineFactory;

/// Tally of a full discover-and-drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub queued: usize,
    pub batches: usize,
    pub pipelines: BatchSummary,
}

/// Scheduler for one tenant scope
pub struct Scheduler {
    settings: SchedulerSettings,
    discoverer: Arc<dyn Discoverer>,
    oracle: Arc<dyn DedupOracle>,
    factory: Arc<dyn PipelineFactory>,
    pool: WorkerPool,
    pending: VecDeque<Pipeline>,
    /// Keys of the pipelines in `pending`
    pending_keys: HashSet<String>,
    last_discovery: Option<Instant>,
    token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        discoverer: Arc<dyn Discoverer>,
        oracle: Arc<dyn DedupOracle>,
        factory: Arc<dyn PipelineFactory>,
    ) -> Self {
        let pool = WorkerPool::new(settings.max_concurrent);
        Self {
            settings,
            discoverer,
            oracle,
            factory,
            pool,
            pending: VecDeque::new(),
            pending_keys: HashSet::new(),
            last_discovery: None,
            token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Moves the loop onto its own task
    pub fn spawn(self) -> SchedulerHandle {
        let token = self.token();
        let handle = tokio::spawn(self.run());
        SchedulerHandle { token, handle }
    }

    /// Runs until the token is cancelled
    ///
    /// The token is checked between batches only, so an in-flight batch
    /// always drains before this returns.
    pub async fn run(mut self) {
        info!(
            tenant_id = %self.settings.tenant_id,
            "Starting scheduler (interval: {:?}, batch size: {}, workers: {})",
            self.settings.poll_interval,
            self.settings.batch_size,
            self.settings.max_concurrent
        );

        while !self.token.is_cancelled() {
            self.discover_and_queue().await;
            self.dispatch_batch().await;

            if self.pending.is_empty() {
                info!(
                    "No pending work, next check in {:?}",
                    self.settings.poll_interval
                );
                if !self.sleep().await {
                    break;
                }
            }
        }

        info!(
            "Scheduler stopped ({} pipeline(s) left pending)",
            self.pending.len()
        );
    }

    /// One discovery followed by batches until the pending queue is empty
    pub async fn run_once(&mut self) -> CycleSummary {
        self.last_discovery = None;
        let mut summary = CycleSummary {
            queued: self.discover_and_queue().await,
            ..CycleSummary::default()
        };

        while let Some(batch) = self.dispatch_batch().await {
            summary.batches += 1;
            summary.pipelines.succeeded += batch.succeeded;
            summary.pipelines.rolled_back += batch.rolled_back;
            summary.pipelines.crashed += batch.crashed;
        }

        summary
    }

    /// Discovers candidates and queues a pipeline for each novel one
    ///
    /// Skipped while a backlog exists and the poll interval has not elapsed
    /// since the last successful discovery. Returns the number queued.
    pub(crate) async fn discover_and_queue(&mut self) -> usize {
        if !self.pending.is_empty()
            && self
                .last_discovery
                .is_some_and(|at| at.elapsed() < self.settings.poll_interval)
        {
            debug!(
                "Backlog of {} pipeline(s), skipping discovery",
                self.pending.len()
            );
            return 0;
        }

        let candidates = match self.discoverer.discover().await {
            Ok(candidates) => {
                self.last_discovery = Some(Instant::now());
                candidates
            }
            Err(e) => {
                error!("Discovery failed: {:#}", e);
                return 0;
            }
        };

        let tenant_id = self.settings.tenant_id;
        let mut queued = 0;

        for candidate in candidates {
            if !candidate.is_dispatchable() {
                debug!("Skipping candidate '{}' without a link", candidate.title);
                continue;
            }
            if self.pending_keys.contains(&candidate.key) {
                debug!(key = %candidate.key, "Already pending");
                continue;
            }

            match self.oracle.is_processed(tenant_id, &candidate.key).await {
                Ok(true) => {
                    debug!(key = %candidate.key, "Already processed");
                    continue;
                }
                Ok(false) => {}
                Err(e) => match self.settings.dedup_failure_policy {
                    DedupFailurePolicy::Skip => {
                        warn!(key = %candidate.key, "Dedup lookup failed, skipping: {:#}", e);
                        continue;
                    }
                    DedupFailurePolicy::Dispatch => {
                        warn!(key = %candidate.key, "Dedup lookup failed, dispatching: {:#}", e);
                    }
                },
            }

            let pipeline = self.factory.build(&candidate);
            self.pending_keys.insert(candidate.key);
            self.pending.push_back(pipeline);
            queued += 1;
        }

        if queued > 0 {
            info!(
                "Queued {} new pipeline(s), {} pending",
                queued,
                self.pending.len()
            );
        }

        queued
    }

    /// Runs up to `batch_size` pending pipelines; `None` when nothing is pending
    pub(crate) async fn dispatch_batch(&mut self) -> Option<BatchSummary> {
        if self.pending.is_empty() {
            return None;
        }

        let take = self.settings.batch_size.min(self.pending.len());
        let batch: Vec<Pipeline> = self.pending.drain(..take).collect();
        for pipeline in &batch {
            self.pending_keys.remove(pipeline.label());
        }

        info!("Dispatching batch of {} pipeline(s)", batch.len());
        let summary = self.pool.run_batch(batch).await;
        info!(
            "Batch drained: {} succeeded, {} rolled back, {} crashed",
            summary.succeeded, summary.rolled_back, summary.crashed
        );

        Some(summary)
    }

    /// Sleeps for the poll interval; `false` if cut short by shutdown
    async fn sleep(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.poll_interval) => true,
            _ = self.token.cancelled() => {
                info!("Shutdown requested during sleep");
                false
            }
        }
    }
}

/// Handle to a spawned scheduler loop
pub struct SchedulerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop and waits for the in-flight batch to drain
    pub async fn shutdown(self) -> Result<()> {
        self.token.cancel();
        self.handle.await.context("Scheduler task panicked")
    }
}
