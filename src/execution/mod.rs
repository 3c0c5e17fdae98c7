//! Batch execution: discovery, the task manager and the run executor

pub mod discovery;
pub mod engine;
pub mod executor;
pub mod scheduler;
pub mod task_manager;

pub use engine::{BatchExecutor, BatchOptions, BatchPlan, BatchReport, RunOutput, RunTotals};
pub use executor::RunExecutor;
pub use scheduler::{BatchId, BatchSummary, TaskId};
pub use task_manager::{Task, TaskContext, TaskEvent, TaskManager, TaskOutcome};
