//! Batch executor - expands one validated pipeline over many input files
//!
//! Planning (validation, discovery, skip-complete filtering) has no side
//! effects beyond reading the file system. Execution submits one task per
//! pending run and waits for the batch on the caller's context.

use crate::{
    core::{
        config::{ExecutionSettings, PipelineConfig},
        error::BatchError,
        pipeline::ValidatedPipeline,
        registry::OperationRegistry,
        run::PipelineRun,
        state::{RunStatus, TaskState},
    },
    execution::{
        discovery::discover,
        executor::RunExecutor,
        task_manager::{Task, TaskManager, TaskOutcome},
    },
    io::{is_complete_artifact, FileImporter, Importer},
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Value produced by a successful run task: the written artifacts
pub type RunOutput = Vec<PathBuf>;

/// Effective execution options after CLI overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub workers: usize,
    pub skip_complete: bool,
}

impl From<ExecutionSettings> for BatchOptions {
    fn from(settings: ExecutionSettings) -> Self {
        Self {
            workers: settings.parallel_workers,
            skip_complete: settings.skip_complete,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        ExecutionSettings::default().into()
    }
}

/// Outcome of planning: every discovered run, pending or skipped
#[derive(Debug, Clone)]
pub struct BatchPlan {
    name: String,
    pipeline: Arc<ValidatedPipeline>,
    runs: Vec<PipelineRun>,
}

impl BatchPlan {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &ValidatedPipeline {
        &self.pipeline
    }

    /// All runs in input order
    pub fn runs(&self) -> &[PipelineRun] {
        &self.runs
    }

    /// Runs that would execute; index mode addresses this list
    pub fn pending(&self) -> Vec<&PipelineRun> {
        self.runs.iter().filter(|r| r.is_pending()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.runs.iter().filter(|r| r.is_pending()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.runs.len() - self.pending_count()
    }
}

/// Per-status counts of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Per-file summary of a batch invocation
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub totals: RunTotals,
    pub runs: Vec<PipelineRun>,
}

impl BatchReport {
    pub fn new(name: impl Into<String>, started_at: DateTime<Utc>, mut runs: Vec<PipelineRun>) -> Self {
        runs.sort_by_key(|r| r.index);
        let mut totals = RunTotals {
            total: runs.len(),
            ..Default::default()
        };
        for run in &runs {
            match run.status {
                RunStatus::Succeeded => totals.succeeded += 1,
                RunStatus::Failed { .. } => totals.failed += 1,
                RunStatus::Skipped => totals.skipped += 1,
                RunStatus::Pending | RunStatus::Running => {}
            }
        }
        Self {
            name: name.into(),
            started_at,
            finished_at: Utc::now(),
            totals,
            runs,
        }
    }

    /// Every reported run succeeded or was skipped
    pub fn is_success(&self) -> bool {
        self.runs.iter().all(|r| r.status.is_ok())
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Status by run id
    pub fn statuses(&self) -> HashMap<&str, &RunStatus> {
        self.runs
            .iter()
            .map(|r| (r.run_id.as_str(), &r.status))
            .collect()
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report {}", path.display()))
    }
}

/// Drives pipeline runs through a task manager
pub struct BatchExecutor {
    registry: Arc<OperationRegistry>,
    importer: Arc<dyn Importer>,
}

impl BatchExecutor {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            registry,
            importer: Arc::new(FileImporter),
        }
    }

    /// Replace the file importer
    pub fn with_importer<I: Importer + 'static>(mut self, importer: I) -> Self {
        self.importer = Arc::new(importer);
        self
    }

    /// Validate, discover and filter; nothing is executed or written
    ///
    /// Validation happens before discovery, so a composition error is
    /// reported before any input is looked at.
    pub fn plan(&self, config: &PipelineConfig, options: &BatchOptions) -> Result<BatchPlan, BatchError> {
        let pipeline = config.to_pipeline().validate(&self.registry)?;
        let files = discover(&config.inputs)?;

        let mut runs: Vec<PipelineRun> = files
            .into_iter()
            .enumerate()
            .map(|(index, path)| {
                let import = config.inputs.import_parameters(&path);
                PipelineRun::new(index, path, import)
            })
            .collect();
        warn_on_shared_run_ids(&runs);

        if options.skip_complete {
            if pipeline.has_exports() {
                for run in runs.iter_mut() {
                    if outputs_complete(&pipeline, &run.run_id) {
                        debug!("Skipping {}: outputs already exist", run.run_id);
                        run.skip();
                    }
                }
            } else {
                warn!("skip-complete has no effect: pipeline has no export step");
            }
        }

        let plan = BatchPlan {
            name: config.display_name(),
            pipeline: Arc::new(pipeline),
            runs,
        };
        info!(
            "Planned {} run(s) for {}: {} pending, {} skipped",
            plan.runs.len(),
            plan.name,
            plan.pending_count(),
            plan.skipped_count()
        );
        Ok(plan)
    }

    /// Execute every pending run with at most `workers` in parallel
    ///
    /// The report holds one entry per planned run, skipped ones included.
    pub async fn run(
        &self,
        plan: BatchPlan,
        manager: &mut TaskManager<RunOutput>,
        workers: usize,
    ) -> Result<BatchReport, BatchError> {
        let started_at = Utc::now();
        let BatchPlan { name, pipeline, runs } = plan;
        let (pending, mut finished): (Vec<_>, Vec<_>) = runs.into_iter().partition(|r| r.is_pending());

        finished.extend(self.execute_runs(pipeline, pending, manager, workers).await?);
        Ok(BatchReport::new(name, started_at, finished))
    }

    /// Execute only the `index`-th pending run
    pub async fn run_index(
        &self,
        plan: BatchPlan,
        index: usize,
        manager: &mut TaskManager<RunOutput>,
    ) -> Result<BatchReport, BatchError> {
        let started_at = Utc::now();
        let total = plan.pending_count();
        let BatchPlan { name, pipeline, runs } = plan;
        let run = runs
            .into_iter()
            .filter(|r| r.is_pending())
            .nth(index)
            .ok_or(BatchError::IndexOutOfRange { index, total })?;

        info!("Executing run {} of {}: {}", index, total, run.run_id);
        let finished = self.execute_runs(pipeline, vec![run], manager, 1).await?;
        Ok(BatchReport::new(name, started_at, finished))
    }

    async fn execute_runs(
        &self,
        pipeline: Arc<ValidatedPipeline>,
        runs: Vec<PipelineRun>,
        manager: &mut TaskManager<RunOutput>,
        workers: usize,
    ) -> Result<Vec<PipelineRun>, BatchError> {
        let executor = Arc::new(RunExecutor::new(pipeline, self.importer.clone()));
        let results = Rc::new(RefCell::new(Vec::with_capacity(runs.len())));

        let tasks = runs
            .into_iter()
            .map(|run| {
                let executor = executor.clone();
                let input = run.clone();
                let results = results.clone();
                Task::new(run.run_id.clone(), move |context| {
                    Ok(executor.execute(&input, context)?)
                })
                .on_complete(move |outcome| {
                    let mut run = run;
                    record_outcome(&mut run, outcome);
                    results.borrow_mut().push(run);
                })
            })
            .collect();

        let batch = manager.submit_task_batch(tasks, workers, |summary| {
            debug!(
                "Batch {} finished: {} succeeded, {} failed, {} cancelled",
                summary.id, summary.succeeded, summary.failed, summary.cancelled
            );
        })?;
        manager.wait_for_batch(batch).await?;

        let finished = results.take();
        Ok(finished)
    }
}

/// Whether every expected output of `run_id` exists and is non-empty
fn outputs_complete(pipeline: &ValidatedPipeline, run_id: &str) -> bool {
    match pipeline.expected_outputs(run_id) {
        Ok(outputs) => !outputs.is_empty() && outputs.iter().all(|p| is_complete_artifact(p)),
        Err(e) => {
            debug!("Cannot derive outputs for {}: {}", run_id, e);
            false
        }
    }
}

fn warn_on_shared_run_ids(runs: &[PipelineRun]) {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for run in runs {
        if let Some(previous) = seen.insert(&run.run_id, &run.input) {
            warn!(
                "{} and {} share run id '{}'; their outputs will collide",
                previous.display(),
                run.input.display(),
                run.run_id
            );
        }
    }
}

/// Fold a task outcome into the run it executed
fn record_outcome(run: &mut PipelineRun, outcome: TaskOutcome<RunOutput>) {
    if let Some(started_at) = outcome.started_at {
        run.start(started_at);
    }
    run.warnings = outcome.warnings;
    match outcome.state {
        TaskState::Succeeded => {
            info!("Run {} succeeded", run.run_id);
            run.succeed(outcome.value.unwrap_or_default());
        }
        TaskState::Failed => {
            let cause = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            warn!("Run {} failed: {}", run.run_id, cause);
            run.fail(cause);
        }
        TaskState::Cancelled => run.fail("cancelled before start"),
        TaskState::Queued | TaskState::Running => {
            warn!("Run {} reported non-terminal state {}", run.run_id, outcome.state.label());
            run.fail(format!("task ended in state {}", outcome.state.label()));
        }
    }
    run.finished_at = Some(outcome.finished_at);
}
