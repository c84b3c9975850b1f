//! Bounded worker pool
//!
//! Pipelines of a batch are spawned onto the runtime, each holding a
//! semaphore permit for its whole run. Submission waits for a free permit, so
//! no more than `size` pipelines execute at once however large the batch is.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use xcavator_core::Pipeline;

/// Tally of one drained batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub rolled_back: usize,
    /// Pipelines whose worker panicked
    ///
    /// A panic unwinds the pipeline before its rollback loop runs, so the
    /// executed prefix of a crashed pipeline is not compensated. Its permit is
    /// still released and its dedup fact is not recorded.
    pub crashed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.rolled_back + self.crashed
    }
}

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
        }
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Runs every pipeline of the batch and returns once all are terminal
    pub async fn run_batch(&self, batch: Vec<Pipeline>) -> BatchSummary {
        let mut workers = JoinSet::new();

        for pipeline in batch {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Worker pool closed: {}", e);
                    break;
                }
            };

            debug!(pipeline = pipeline.label(), "Dispatching pipeline");
            workers.spawn(async move {
                let report = pipeline.run().await;
                drop(permit);
                report
            });
        }

        let mut summary = BatchSummary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) if report.is_success() => summary.succeeded += 1,
                Ok(_) => summary.rolled_back += 1,
                Err(e) => {
                    warn!("Pipeline worker panicked: {}", e);
                    summary.crashed += 1;
                }
            }
        }

        summary
    }
}
