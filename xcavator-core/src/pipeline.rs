//! Pipeline engine
//!
//! A pipeline is an ordered list of tasks plus one scratch-space. Tasks run
//! sequentially; each completed task is pushed onto an executed stack. On the
//! first failure the remaining tasks are abandoned and the executed stack is
//! popped in reverse, invoking each task's rollback.
//!
//! The failure is reported in the returned [`PipelineReport`], never raised, so
//! one pipeline's failure cannot abort sibling pipelines in the same batch.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::domain::xcom::{Xcom, XcomValue};
use crate::task::{Task, TaskError};

/// Terminal state of a pipeline execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PipelineOutcome {
    /// Every task ran
    Completed,

    /// A strict prefix ran, then was rolled back in reverse
    RolledBack {
        /// The task whose `run` failed
        failed_task: String,
        /// Rendered error of the failed task
        error: String,
        /// `(task, error)` for each compensation that itself failed
        rollback_failures: Vec<(String, String)>,
    },
}

/// What happened during one pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub label: String,
    /// Tasks that completed `run`, in execution order
    pub executed: Vec<String>,
    /// Tasks whose rollback was invoked, in invocation order
    pub rolled_back: Vec<String>,
    pub outcome: PipelineOutcome,
    /// Scratch-space as it stood when the pipeline finished
    pub xcom: Xcom,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Completed)
    }

    pub fn failed_task(&self) -> Option<&str> {
        match &self.outcome {
            PipelineOutcome::Completed => None,
            PipelineOutcome::RolledBack { failed_task, .. } => Some(failed_task),
        }
    }
}

/// An ordered sequence of tasks sharing one scratch-space
///
/// Built once per work item, run once, then discarded: [`Pipeline::run`]
/// consumes it.
pub struct Pipeline {
    label: String,
    tasks: Vec<Box<dyn Task>>,
    xcom: Xcom,
    /// Indices into `tasks` that completed `run`, in order
    executed: Vec<usize>,
    task_timeout: Option<Duration>,
}

impl Pipeline {
    /// Creates an empty pipeline
    ///
    /// # Arguments
    /// * `label` - Name used to tag log events (typically the work-item key)
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tasks: Vec::new(),
            xcom: Xcom::new(),
            executed: Vec::new(),
            task_timeout: None,
        }
    }

    /// Seeds the scratch-space
    pub fn with_xcom(mut self, xcom: Xcom) -> Self {
        self.xcom = xcom;
        self
    }

    /// Bounds every `run` and `rollback` call; an overrun is a task failure
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Appends a task; insertion order is execution order
    pub fn add_task<T: Task + 'static>(&mut self, task: T) -> &mut Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Builder form of [`Pipeline::add_task`]
    pub fn with_task<T: Task + 'static>(mut self, task: T) -> Self {
        self.add_task(task);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn xcom(&self) -> &Xcom {
        &self.xcom
    }

    /// Runs every task in order, rolling back on the first failure
    pub async fn run(mut self) -> PipelineReport {
        let started = Instant::now();
        let tasks = std::mem::take(&mut self.tasks);
        let mut failure: Option<(String, TaskError)> = None;

        for (idx, task) in tasks.iter().enumerate() {
            info!(
                pipeline = %self.label,
                task = task.name(),
                "Running task {}/{}",
                idx + 1,
                tasks.len()
            );

            match self.run_task(task.as_ref()).await {
                Ok(result) => {
                    if let Some(value) = result {
                        self.xcom.insert(task.name(), value);
                    }
                    self.executed.push(idx);
                    task.on_success(&self.xcom).await;
                    debug!(pipeline = %self.label, task = task.name(), "Task completed");
                }
                Err(e) => {
                    error!(pipeline = %self.label, task = task.name(), "Task failed: {}", e);
                    failure = Some((task.name().to_string(), e));
                    break;
                }
            }
        }

        let executed: Vec<String> = self
            .executed
            .iter()
            .map(|&idx| tasks[idx].name().to_string())
            .collect();

        let (outcome, rolled_back) = match failure {
            None => {
                info!(pipeline = %self.label, "Pipeline completed ({} task(s))", tasks.len());
                (PipelineOutcome::Completed, Vec::new())
            }
            Some((failed_task, error)) => {
                let (rolled_back, rollback_failures) = self.rollback(&tasks).await;
                warn!(
                    pipeline = %self.label,
                    failed_task = %failed_task,
                    "Pipeline rolled back {} task(s)",
                    rolled_back.len()
                );
                (
                    PipelineOutcome::RolledBack {
                        failed_task,
                        error: error.to_string(),
                        rollback_failures,
                    },
                    rolled_back,
                )
            }
        };

        PipelineReport {
            label: self.label,
            executed,
            rolled_back,
            outcome,
            xcom: self.xcom,
            elapsed: started.elapsed(),
        }
    }

    async fn run_task(&mut self, task: &dyn Task) -> Result<Option<XcomValue>, TaskError> {
        match self.task_timeout {
            Some(after) => tokio::time::timeout(after, task.run(&mut self.xcom))
                .await
                .map_err(|_| TaskError::TimedOut {
                    task: task.name().to_string(),
                    after,
                })?,
            None => task.run(&mut self.xcom).await,
        }
    }

    /// Pops the executed stack, compensating each task
    ///
    /// Each rollback is guarded on its own: a failing compensation is logged
    /// and collected, and the tasks before it are still rolled back.
    async fn rollback(
        &mut self,
        tasks: &[Box<dyn Task>],
    ) -> (Vec<String>, Vec<(String, String)>) {
        let mut rolled_back = Vec::new();
        let mut failures = Vec::new();

        while let Some(idx) = self.executed.pop() {
            let task = tasks[idx].as_ref();
            info!(pipeline = %self.label, task = task.name(), "Rolling back task");
            rolled_back.push(task.name().to_string());

            let result = match self.task_timeout {
                Some(after) => tokio::time::timeout(after, task.rollback(&mut self.xcom))
                    .await
                    .unwrap_or_else(|_| {
                        Err(TaskError::TimedOut {
                            task: task.name().to_string(),
                            after,
                        })
                    }),
                None => task.rollback(&mut self.xcom).await,
            };

            if let Err(e) = result {
                error!(pipeline = %self.label, task = task.name(), "Rollback failed: {}", e);
                failures.push((task.name().to_string(), e.to_string()));
            }
        }

        (rolled_back, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Task that records its calls and can be told to fail
    struct Recording {
        name: String,
        journal: Journal,
        fail_run: bool,
        fail_rollback: bool,
        output: Option<String>,
        delay: Option<Duration>,
    }

    impl Recording {
        fn new(name: &str, journal: &Journal) -> Self {
            Self {
                name: name.to_string(),
                journal: Arc::clone(journal),
                fail_run: false,
                fail_rollback: false,
                output: None,
                delay: None,
            }
        }

        fn failing(mut self) -> Self {
            self.fail_run = true;
            self
        }

        fn failing_rollback(mut self) -> Self {
            self.fail_rollback = true;
            self
        }

        fn returning(mut self, output: &str) -> Self {
            self.output = Some(output.to_string());
            self
        }

        fn sleeping(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Task for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
            self.journal.lock().unwrap().push(format!("run:{}", self.name));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_run {
                return Err(TaskError::failed(format!("{} exploded", self.name)));
            }
            xcom.insert(format!("{}_data", self.name), "written");
            Ok(self.output.clone().map(XcomValue::Text))
        }

        async fn rollback(&self, _xcom: &mut Xcom) -> Result<(), TaskError> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("rollback:{}", self.name));
            if self.fail_rollback {
                return Err(TaskError::failed("compensation failed"));
            }
            Ok(())
        }
    }

    fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_empty_pipeline_completes() {
        let report = Pipeline::new("empty").run().await;
        assert!(report.is_success());
        assert!(report.executed.is_empty());
        assert!(report.rolled_back.is_empty());
    }

    #[tokio::test]
    async fn test_all_tasks_succeed_in_order() {
        let journal = journal();
        let report = Pipeline::new("ok")
            .with_task(Recording::new("a", &journal))
            .with_task(Recording::new("b", &journal))
            .with_task(Recording::new("c", &journal))
            .run()
            .await;

        assert!(report.is_success());
        assert_eq!(report.executed, vec!["a", "b", "c"]);
        assert!(report.rolled_back.is_empty());
        assert_eq!(entries(&journal), vec!["run:a", "run:b", "run:c"]);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_prefix_in_reverse() {
        let journal = journal();
        let report = Pipeline::new("fails")
            .with_task(Recording::new("t1", &journal))
            .with_task(Recording::new("t2", &journal))
            .with_task(Recording::new("t3", &journal).failing())
            .with_task(Recording::new("t4", &journal))
            .run()
            .await;

        assert_eq!(report.failed_task(), Some("t3"));
        assert_eq!(report.executed, vec!["t1", "t2"]);
        assert_eq!(report.rolled_back, vec!["t2", "t1"]);
        assert_eq!(
            entries(&journal),
            vec!["run:t1", "run:t2", "run:t3", "rollback:t2", "rollback:t1"]
        );
    }

    #[tokio::test]
    async fn test_first_task_failure_rolls_back_nothing() {
        let journal = journal();
        let report = Pipeline::new("first")
            .with_task(Recording::new("only", &journal).failing())
            .with_task(Recording::new("never", &journal))
            .run()
            .await;

        assert!(!report.is_success());
        assert!(report.rolled_back.is_empty());
        assert_eq!(entries(&journal), vec!["run:only"]);
    }

    #[tokio::test]
    async fn test_each_rollback_runs_at_most_once() {
        let journal = journal();
        let report = Pipeline::new("once")
            .with_task(Recording::new("a", &journal))
            .with_task(Recording::new("b", &journal))
            .with_task(Recording::new("c", &journal).failing())
            .run()
            .await;

        let log = entries(&journal);
        for name in ["a", "b", "c"] {
            let rollbacks = log
                .iter()
                .filter(|e| *e == &format!("rollback:{name}"))
                .count();
            assert!(rollbacks <= 1, "{name} rolled back {rollbacks} times");
        }
        assert_eq!(report.rolled_back.len(), 2);
    }

    #[tokio::test]
    async fn test_rollback_failure_does_not_stop_earlier_rollbacks() {
        let journal = journal();
        let report = Pipeline::new("guarded")
            .with_task(Recording::new("a", &journal))
            .with_task(Recording::new("b", &journal).failing_rollback())
            .with_task(Recording::new("c", &journal).failing())
            .run()
            .await;

        assert_eq!(report.rolled_back, vec!["b", "a"]);
        match report.outcome {
            PipelineOutcome::RolledBack {
                rollback_failures, ..
            } => {
                assert_eq!(rollback_failures.len(), 1);
                assert_eq!(rollback_failures[0].0, "b");
            }
            PipelineOutcome::Completed => panic!("expected rollback"),
        }
        assert!(entries(&journal).contains(&"rollback:a".to_string()));
    }

    #[tokio::test]
    async fn test_results_stored_under_task_name() {
        let journal = journal();
        let report = Pipeline::new("results")
            .with_task(Recording::new("producer", &journal).returning("value"))
            .with_task(Recording::new("silent", &journal))
            .run()
            .await;

        assert_eq!(
            report.xcom.text("producer").unwrap().map(String::as_str),
            Some("value")
        );
        assert!(!report.xcom.contains("silent"));
        assert!(report.xcom.contains("silent_data"));
    }

    #[tokio::test]
    async fn test_seeded_xcom_is_visible() {
        let mut seed = Xcom::new();
        seed.insert("url", "https://example.com");

        let pipeline = Pipeline::new("seeded").with_xcom(seed);
        assert_eq!(
            pipeline.xcom().require_text("url").unwrap(),
            "https://example.com"
        );

        let report = pipeline.run().await;
        assert!(report.xcom.contains("url"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_task_is_a_failure() {
        let journal = journal();
        let report = Pipeline::new("slow")
            .with_task_timeout(Duration::from_secs(5))
            .with_task(Recording::new("fast", &journal))
            .with_task(Recording::new("stalled", &journal).sleeping(Duration::from_secs(60)))
            .with_task(Recording::new("after", &journal))
            .run()
            .await;

        assert_eq!(report.failed_task(), Some("stalled"));
        assert_eq!(report.rolled_back, vec!["fast"]);
        match report.outcome {
            PipelineOutcome::RolledBack { error, .. } => assert!(error.contains("timed out")),
            PipelineOutcome::Completed => panic!("expected timeout"),
        }
        assert!(!entries(&journal).contains(&"run:after".to_string()));
    }

    /// Finishes `run` quickly but settles slowly afterwards
    struct Settling {
        journal: Journal,
        settle: Duration,
    }

    #[async_trait]
    impl Task for Settling {
        fn name(&self) -> &str {
            "settling"
        }

        async fn run(&self, _xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
            Ok(Some(XcomValue::Text("receipt".to_string())))
        }

        async fn on_success(&self, xcom: &Xcom) {
            tokio::time::sleep(self.settle).await;
            let seen = xcom.text("settling").ok().flatten().cloned();
            self.journal
                .lock()
                .unwrap()
                .push(format!("settled:{}", seen.unwrap_or_default()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_success_is_not_bounded_by_task_timeout() {
        let journal = journal();
        let report = Pipeline::new("settle")
            .with_task_timeout(Duration::from_secs(5))
            .with_task(Recording::new("first", &journal))
            .with_task(Settling {
                journal: Arc::clone(&journal),
                settle: Duration::from_secs(30),
            })
            .run()
            .await;

        assert!(report.is_success());
        assert!(report.rolled_back.is_empty());
        assert_eq!(entries(&journal), vec!["run:first", "settled:receipt"]);
    }

    #[tokio::test]
    async fn test_on_success_skipped_for_failed_run() {
        let journal = journal();

        struct FailingSettle(Journal);

        #[async_trait]
        impl Task for FailingSettle {
            fn name(&self) -> &str {
                "failing"
            }

            async fn run(&self, _xcom: &mut Xcom) -> Result<Option<XcomValue>, TaskError> {
                Err(TaskError::failed("no"))
            }

            async fn on_success(&self, _xcom: &Xcom) {
                self.0.lock().unwrap().push("settled".to_string());
            }
        }

        let report = Pipeline::new("unsettled")
            .with_task(FailingSettle(Arc::clone(&journal)))
            .run()
            .await;

        assert!(!report.is_success());
        assert!(entries(&journal).is_empty());
    }

    #[test]
    fn test_task_names_follow_insertion_order() {
        let journal = journal();
        let mut pipeline = Pipeline::new("names");
        pipeline
            .add_task(Recording::new("x", &journal))
            .add_task(Recording::new("y", &journal));

        assert_eq!(pipeline.task_names(), vec!["x", "y"]);
        assert_eq!(pipeline.len(), 2);
        assert!(!pipeline.is_empty());
        assert_eq!(pipeline.label(), "names");
    }
}
