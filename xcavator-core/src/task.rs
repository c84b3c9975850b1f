//! Task contract
//!
//! A task is one named step of a pipeline. It reads and writes the pipeline's
//! scratch-space and may define a compensating rollback action that is invoked
//! only if it completed and a later task failed.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::xcom::{Xcom, XcomValue};

/// Errors raised by a task's `run` or `rollback`
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task could not complete
    #[error("{0}")]
    Failed(String),

    /// A required scratch-space key was absent
    #[error("missing xcom key '{0}'")]
    MissingKey(String),

    /// A scratch-space key held an unexpected variant
    #[error("xcom key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The task exceeded the pipeline's task timeout
    #[error("task '{task}' timed out after {after:?}")]
    TimedOut { task: String, after: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A unit of work within a pipeline
///
/// `run` is invoked at most once per pipeline execution. A returned value is
/// stored in the scratch-space under the task's name; `None` leaves that key
/// untouched.
///
/// `on_success` follows a successful `run` once its result is stored. It runs
/// outside the task timeout and cannot fail the task, so a side effect that
/// already happened is never compensated because its bookkeeping was slow.
///
/// `rollback` is best-effort. Its errors are reported by the pipeline and
/// never stop the rollback of earlier tasks.
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable identifier used for logging and as the result key
    fn name(&self) -> &str;

    async fn run(&self, xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError>;

    async fn on_success(&self, _xcom: &Xcom) {}

    async fn rollback(&self, _xcom: &mut Xcom) -> Result<(), TaskError> {
        Ok(())
    }
}
