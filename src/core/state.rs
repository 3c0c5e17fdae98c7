//! Execution state models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Planned, not yet handed to a worker
    Pending,
    /// Steps are executing; reports only hold it while a run is live
    Running,
    /// Every step completed and all outputs were written
    Succeeded,
    /// Import, a step or an export failed
    Failed { cause: String },
    /// Outputs already existed; no operation was invoked
    Skipped,
}

impl RunStatus {
    /// Check if the run is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed { .. } | RunStatus::Skipped
        )
    }

    /// Whether this outcome counts towards a zero exit code
    pub fn is_ok(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Skipped)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed { .. } => "failed",
            RunStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Failed { cause } => write!(f, "Failed: {}", cause),
            RunStatus::Pending => f.write_str("Pending"),
            RunStatus::Running => f.write_str("Running"),
            RunStatus::Succeeded => f.write_str("Succeeded"),
            RunStatus::Skipped => f.write_str("Skipped"),
        }
    }
}

/// Lifecycle of a task in the task manager
///
/// `Queued -> Running -> {Succeeded, Failed}` or `Queued -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        }
    }
}
