//! Error taxonomy for registry, composition, run and task failures

use crate::core::operation::{DataKind, ParamType};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while populating or querying the operation registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
}

/// A single problem found while validating a pipeline
///
/// `step` is the zero-based position of the offending step.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("pipeline has no steps")]
    EmptyPipeline,

    #[error("step {step}: unknown operation '{operation}'")]
    UnknownOperation { step: usize, operation: String },

    #[error("step {step} ({operation}): missing required parameter '{parameter}'")]
    MissingParameter {
        step: usize,
        operation: String,
        parameter: String,
    },

    #[error("step {step} ({operation}): unknown parameter '{parameter}'")]
    UnknownParameter {
        step: usize,
        operation: String,
        parameter: String,
    },

    #[error("step {step} ({operation}): parameter '{parameter}' expects {expected}, got {found}")]
    TypeMismatch {
        step: usize,
        operation: String,
        parameter: String,
        expected: ParamType,
        found: String,
    },

    #[error("step {step} ({operation}): parameter '{parameter}' = {value} is outside {bounds}")]
    OutOfRange {
        step: usize,
        operation: String,
        parameter: String,
        value: f64,
        bounds: String,
    },

    #[error("step {step} ({operation}): parameter '{parameter}' = '{value}' is not one of [{}]", .choices.join(", "))]
    InvalidChoice {
        step: usize,
        operation: String,
        parameter: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("step {step} ({operation}) expects {expected} input but step {previous} ({previous_operation}) produces {produced}")]
    IncompatibleKinds {
        step: usize,
        operation: String,
        expected: DataKind,
        previous: usize,
        previous_operation: String,
        produced: DataKind,
    },

    #[error("first step ({operation}) expects {expected} input and cannot accept imported {}", DataKind::IMPORTED)]
    InvalidEntryKind { operation: String, expected: DataKind },
}

/// A pipeline failed validation; carries every violation found
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid pipeline: {} problem(s) found", .violations.len())]
pub struct CompositionError {
    pub violations: Vec<Violation>,
}

impl CompositionError {
    /// Whether any violation is an unknown reference to `operation`
    pub fn names_unknown_operation(&self, operation: &str) -> bool {
        self.violations.iter().any(|v| {
            matches!(v, Violation::UnknownOperation { operation: op, .. } if op == operation)
        })
    }
}

/// Input file could not be turned into geometry
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported input format '{extension}' for {path}")]
    Unsupported { path: PathBuf, extension: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt input {path}: missing column {column}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("corrupt input {path} (line {line}): {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// A pipeline step failed for one input
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// Output could not be persisted
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Parameter(#[from] OperationError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("expected output {path} is missing or empty")]
    MissingArtifact { path: PathBuf },
}

/// Anything that terminates a single run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("step {step} ({operation}) failed: {source}")]
    Operation {
        step: usize,
        operation: String,
        #[source]
        source: OperationError,
    },

    #[error("step {step} ({operation}) export failed: {source}")]
    Export {
        step: usize,
        operation: String,
        #[source]
        source: ExportError,
    },
}

/// Task manager refused a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    #[error("task manager has been shut down")]
    ShutDown,

    #[error("concurrency limit must be at least 1")]
    ZeroConcurrency,
}

/// Batch-level failures that happen before or around run submission
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    #[error("failed to list input directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("no input files found")]
    NoInputs,

    #[error("index {index} out of range [0, {total})")]
    IndexOutOfRange { index: usize, total: usize },
}
