//! Task manager - bounded worker pool with lifecycle notifications
//!
//! A scheduler task owns the admission queue and the running count. Task
//! bodies run on tokio's blocking pool. Everything the submitter needs to
//! hear about (starts, outcomes, batch completion, the periodic running
//! count) arrives on a single notice channel that only the [`TaskManager`]
//! handle reads, so completion callbacks run on the submitter's own context
//! and never need to be thread-safe.
//!
//! Callbacks fire while the handle dispatches notices: through
//! [`TaskManager::dispatch_pending`], [`TaskManager::next_event`],
//! [`TaskManager::wait_for_batch`] or [`TaskManager::shutdown`].

use crate::core::{error::ConcurrencyError, state::TaskState};
use crate::execution::scheduler::{AdmissionQueue, BatchId, BatchSummary, TaskId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default period of [`TaskEvent::RunningCount`]
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Body of a task; runs on a worker thread
pub type TaskBody<T> = Box<dyn FnOnce(&mut TaskContext) -> anyhow::Result<T> + Send + 'static>;

/// Completion callback; runs on the submitter's context
pub type CompletionCallback<T> = Box<dyn FnOnce(TaskOutcome<T>) + 'static>;

/// Batch completion callback
pub type BatchCallback = Box<dyn FnOnce(BatchSummary) + 'static>;

/// Observer of task lifecycle events
pub type EventHandler = Box<dyn FnMut(&TaskEvent) + 'static>;

/// Handed to a running task body
#[derive(Debug)]
pub struct TaskContext {
    id: TaskId,
    name: String,
    warnings: Vec<String>,
}

impl TaskContext {
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            warnings: Vec::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a non-fatal problem; delivered with the task's outcome
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("Task {} warning: {}", self.name, message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Terminal result of a task
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    /// Return value when `state` is `Succeeded`
    pub value: Option<T>,
    /// Cause when `state` is `Failed`
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

impl<T> TaskOutcome<T> {
    fn cancelled(id: TaskId, name: String) -> Self {
        Self {
            id,
            name,
            state: TaskState::Cancelled,
            value: None,
            error: None,
            warnings: Vec::new(),
            started_at: None,
            finished_at: Utc::now(),
        }
    }
}

/// Lifecycle notification seen by event handlers
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Started { id: TaskId, name: String },
    Finished { id: TaskId, name: String, state: TaskState },
    BatchCompleted(BatchSummary),
    /// Best-effort sample of the number of running tasks, sent when it changes
    RunningCount(usize),
    /// The scheduler has drained and exited
    Stopped,
}

/// A unit of work prepared for submission
pub struct Task<T> {
    id: TaskId,
    name: String,
    body: TaskBody<T>,
    on_complete: Option<CompletionCallback<T>>,
}

impl<T> Task<T> {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&mut TaskContext) -> anyhow::Result<T> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            body: Box::new(body),
            on_complete: None,
        }
    }

    /// Attach a callback fired exactly once with the terminal outcome
    pub fn on_complete<C>(mut self, callback: C) -> Self
    where
        C: FnOnce(TaskOutcome<T>) + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

struct Job<T> {
    name: String,
    body: TaskBody<T>,
}

enum Command<T> {
    Submit {
        id: TaskId,
        job: Job<T>,
    },
    SubmitBatch {
        batch: BatchId,
        limit: usize,
        jobs: Vec<(TaskId, Job<T>)>,
    },
    Cancel {
        id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

enum Notice<T> {
    Started { id: TaskId, name: String },
    Finished(TaskOutcome<T>),
    BatchCompleted(BatchSummary),
    RunningCount(usize),
    Stopped,
}

struct Completion<T> {
    batch: Option<BatchId>,
    outcome: TaskOutcome<T>,
}

/// Handle to a worker pool of fixed capacity
///
/// Owned by the submitting context. The handle is not `Send`: callbacks
/// capture submitter-local state.
pub struct TaskManager<T> {
    commands: mpsc::UnboundedSender<Command<T>>,
    notices: mpsc::UnboundedReceiver<Notice<T>>,
    callbacks: HashMap<TaskId, CompletionCallback<T>>,
    batch_callbacks: HashMap<BatchId, BatchCallback>,
    open_batches: HashSet<BatchId>,
    handlers: Vec<EventHandler>,
    running: Arc<AtomicUsize>,
    workers: usize,
    accepting: bool,
    stopped: bool,
    scheduler: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> TaskManager<T> {
    /// Start a pool with `workers` slots; must be called inside a tokio runtime
    pub fn new(workers: usize) -> Result<Self, ConcurrencyError> {
        Self::with_report_interval(workers, DEFAULT_REPORT_INTERVAL)
    }

    pub fn with_report_interval(workers: usize, interval: Duration) -> Result<Self, ConcurrencyError> {
        if workers == 0 {
            return Err(ConcurrencyError::ZeroConcurrency);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicUsize::new(0));

        let scheduler = tokio::spawn(schedule(
            command_rx,
            notice_tx,
            workers,
            running.clone(),
            interval,
        ));
        info!("Task manager started with {} worker(s)", workers);

        Ok(Self {
            commands: command_tx,
            notices: notice_rx,
            callbacks: HashMap::new(),
            batch_callbacks: HashMap::new(),
            open_batches: HashSet::new(),
            handlers: Vec::new(),
            running,
            workers,
            accepting: true,
            stopped: false,
            scheduler: Some(scheduler),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Tasks currently holding a worker slot
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Register an observer for every dispatched event
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&TaskEvent) + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Submit a single task; returns immediately
    pub fn submit_task<F, C>(&mut self, name: impl Into<String>, body: F, on_complete: C) -> Result<TaskId, ConcurrencyError>
    where
        F: FnOnce(&mut TaskContext) -> anyhow::Result<T> + Send + 'static,
        C: FnOnce(TaskOutcome<T>) + 'static,
    {
        self.submit(Task::new(name, body).on_complete(on_complete))
    }

    /// Submit a prepared task
    pub fn submit(&mut self, task: Task<T>) -> Result<TaskId, ConcurrencyError> {
        self.ensure_accepting()?;
        let Task {
            id,
            name,
            body,
            on_complete,
        } = task;

        self.commands
            .send(Command::Submit {
                id,
                job: Job { name, body },
            })
            .map_err(|_| ConcurrencyError::ShutDown)?;
        if let Some(callback) = on_complete {
            self.callbacks.insert(id, callback);
        }
        Ok(id)
    }

    /// Submit tasks that run at most `max_concurrent` at a time
    ///
    /// Members start in the given order. `on_batch_complete` fires once all
    /// of them are terminal, right away for an empty batch.
    pub fn submit_task_batch<C>(
        &mut self,
        tasks: Vec<Task<T>>,
        max_concurrent: usize,
        on_batch_complete: C,
    ) -> Result<BatchId, ConcurrencyError>
    where
        C: FnOnce(BatchSummary) + 'static,
    {
        self.ensure_accepting()?;
        if max_concurrent == 0 {
            return Err(ConcurrencyError::ZeroConcurrency);
        }

        let batch = Uuid::new_v4();
        let mut jobs = Vec::with_capacity(tasks.len());
        let mut callbacks = Vec::new();
        for task in tasks {
            if let Some(callback) = task.on_complete {
                callbacks.push((task.id, callback));
            }
            jobs.push((
                task.id,
                Job {
                    name: task.name,
                    body: task.body,
                },
            ));
        }

        debug!(
            "Submitting batch {} ({} tasks, max {} concurrent)",
            batch,
            jobs.len(),
            max_concurrent
        );
        self.commands
            .send(Command::SubmitBatch {
                batch,
                limit: max_concurrent,
                jobs,
            })
            .map_err(|_| ConcurrencyError::ShutDown)?;

        self.callbacks.extend(callbacks);
        self.batch_callbacks.insert(batch, Box::new(on_batch_complete));
        self.open_batches.insert(batch);
        Ok(batch)
    }

    /// Cancel a task that has not started; `false` if it already runs or ended
    pub async fn cancel(&mut self, id: TaskId) -> bool {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Cancel { id, reply }).is_err() {
            return false;
        }
        response.await.unwrap_or(false)
    }

    /// Run callbacks for every notice already received, without waiting
    pub fn dispatch_pending(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(notice) = self.notices.try_recv() {
            self.dispatch(notice);
            dispatched += 1;
        }
        dispatched
    }

    /// Wait for the next notice and dispatch it
    ///
    /// Returns `None` once the scheduler has stopped and all notices are
    /// consumed.
    pub async fn next_event(&mut self) -> Option<TaskEvent> {
        let notice = self.notices.recv().await?;
        Some(self.dispatch(notice))
    }

    /// Dispatch notices until `batch` has completed
    ///
    /// This is the only call that suspends the submitter on task progress.
    pub async fn wait_for_batch(&mut self, batch: BatchId) -> Result<(), ConcurrencyError> {
        while self.open_batches.contains(&batch) {
            match self.notices.recv().await {
                Some(notice) => {
                    self.dispatch(notice);
                }
                None => return Err(ConcurrencyError::ShutDown),
            }
        }
        Ok(())
    }

    /// Stop accepting work, let queued and running tasks finish, stop the pool
    pub async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.accepting = false;
        let _ = self.commands.send(Command::Shutdown);

        while !self.stopped {
            match self.notices.recv().await {
                Some(notice) => {
                    self.dispatch(notice);
                }
                None => break,
            }
        }
        self.stopped = true;

        if let Some(handle) = self.scheduler.take() {
            if let Err(e) = handle.await {
                warn!("Task scheduler exited abnormally: {}", e);
            }
        }
        info!("Task manager shut down");
    }

    fn ensure_accepting(&self) -> Result<(), ConcurrencyError> {
        if self.accepting {
            Ok(())
        } else {
            Err(ConcurrencyError::ShutDown)
        }
    }

    fn dispatch(&mut self, notice: Notice<T>) -> TaskEvent {
        match notice {
            Notice::Started { id, name } => {
                let event = TaskEvent::Started { id, name };
                self.emit(&event);
                event
            }
            Notice::Finished(outcome) => {
                let event = TaskEvent::Finished {
                    id: outcome.id,
                    name: outcome.name.clone(),
                    state: outcome.state,
                };
                self.emit(&event);
                if let Some(callback) = self.callbacks.remove(&outcome.id) {
                    callback(outcome);
                }
                event
            }
            Notice::BatchCompleted(summary) => {
                let event = TaskEvent::BatchCompleted(summary);
                self.emit(&event);
                self.open_batches.remove(&summary.id);
                if let Some(callback) = self.batch_callbacks.remove(&summary.id) {
                    callback(summary);
                }
                event
            }
            Notice::RunningCount(count) => {
                let event = TaskEvent::RunningCount(count);
                self.emit(&event);
                event
            }
            Notice::Stopped => {
                self.stopped = true;
                self.emit(&TaskEvent::Stopped);
                TaskEvent::Stopped
            }
        }
    }

    fn emit(&mut self, event: &TaskEvent) {
        for handler in self.handlers.iter_mut() {
            handler(event);
        }
    }
}

/// Scheduler loop: admits queued work, collects completions, reports
async fn schedule<T: Send + 'static>(
    mut commands: mpsc::UnboundedReceiver<Command<T>>,
    notices: mpsc::UnboundedSender<Notice<T>>,
    workers: usize,
    running: Arc<AtomicUsize>,
    interval: Duration,
) {
    let mut queue: AdmissionQueue<Job<T>> = AdmissionQueue::new(workers);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion<T>>();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut draining = false;
    let mut commands_closed = false;
    let mut last_reported: Option<usize> = None;

    loop {
        while let Some(admitted) = queue.admit() {
            let name = admitted.job.name.clone();
            debug!("Starting task {} ({})", name, admitted.id);
            let _ = notices.send(Notice::Started {
                id: admitted.id,
                name,
            });
            spawn_job(admitted.id, admitted.batch, admitted.job, done_tx.clone());
        }
        running.store(queue.running(), Ordering::SeqCst);

        if (draining || commands_closed) && queue.is_idle() {
            break;
        }

        tokio::select! {
            command = commands.recv(), if !commands_closed => match command {
                Some(Command::Submit { id, job }) => queue.push(id, job),
                Some(Command::SubmitBatch { batch, limit, jobs }) => {
                    if let Some(summary) = queue.push_batch(batch, limit, jobs) {
                        let _ = notices.send(Notice::BatchCompleted(summary));
                    }
                }
                Some(Command::Cancel { id, reply }) => {
                    let cancelled = match queue.cancel(id) {
                        Some((job, finished)) => {
                            debug!("Cancelled queued task {} ({})", job.name, id);
                            let _ = notices.send(Notice::Finished(TaskOutcome::cancelled(id, job.name)));
                            if let Some(summary) = finished {
                                let _ = notices.send(Notice::BatchCompleted(summary));
                            }
                            true
                        }
                        None => false,
                    };
                    let _ = reply.send(cancelled);
                }
                Some(Command::Shutdown) => {
                    debug!("Shutdown requested, draining {} queued task(s)", queue.queued());
                    draining = true;
                }
                None => commands_closed = true,
            },
            Some(done) = done_rx.recv() => {
                let finished = queue.complete(done.batch, done.outcome.state);
                running.store(queue.running(), Ordering::SeqCst);
                let _ = notices.send(Notice::Finished(done.outcome));
                if let Some(summary) = finished {
                    let _ = notices.send(Notice::BatchCompleted(summary));
                }
            }
            _ = ticker.tick() => {
                // only changes are reported, an idle pool stays quiet
                let count = queue.running();
                if last_reported != Some(count) {
                    last_reported = Some(count);
                    let _ = notices.send(Notice::RunningCount(count));
                }
            }
        }
    }

    running.store(0, Ordering::SeqCst);
    let _ = notices.send(Notice::Stopped);
}

/// Run a job on the blocking pool and report its outcome
fn spawn_job<T: Send + 'static>(
    id: TaskId,
    batch: Option<BatchId>,
    job: Job<T>,
    done: mpsc::UnboundedSender<Completion<T>>,
) {
    let Job { name, body } = job;
    tokio::spawn(async move {
        let started_at = Utc::now();
        let context = TaskContext::new(id, name.clone());
        let result = tokio::task::spawn_blocking(move || {
            let mut context = context;
            let result = body(&mut context);
            (result, context.warnings)
        })
        .await;

        let (state, value, error, warnings) = match result {
            Ok((Ok(value), warnings)) => (TaskState::Succeeded, Some(value), None, warnings),
            Ok((Err(e), warnings)) => (TaskState::Failed, None, Some(e.to_string()), warnings),
            Err(join_error) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic());
                (
                    TaskState::Failed,
                    None,
                    Some(format!("task panicked: {}", message)),
                    Vec::new(),
                )
            }
            Err(join_error) => (TaskState::Failed, None, Some(join_error.to_string()), Vec::new()),
        };

        if let Some(error) = &error {
            debug!("Task {} failed: {}", name, error);
        }

        let _ = done.send(Completion {
            batch,
            outcome: TaskOutcome {
                id,
                name,
                state,
                value,
                error,
                warnings,
                started_at: Some(started_at),
                finished_at: Utc::now(),
            },
        });
    });
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
