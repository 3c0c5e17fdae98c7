//! membatch - batch pipeline runner for membrane geometry
//!
//! Validated pipelines of registered operations, applied to many input
//! files through a bounded worker pool.

pub mod cli;
pub mod core;
pub mod execution;
pub mod io;
pub mod operations;

// Re-export commonly used types
pub use crate::core::{
    config::PipelineConfig, CompositionError, OperationRegistry, Pipeline, PipelineRun, RunStatus,
    TaskState, ValidatedPipeline,
};
pub use crate::execution::{BatchExecutor, BatchOptions, BatchReport, TaskEvent, TaskManager};
