//! A single pipeline applied to a single input file

use crate::core::state::RunStatus;
use crate::io::ImportParameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One input file's pass through the pipeline
///
/// Created in bulk at batch start and discarded once its result has been
/// reported. The intermediate geometry lives only inside the task that
/// executes the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Position in the discovered input order
    pub index: usize,

    /// Stem used to name outputs
    pub run_id: String,

    pub input: PathBuf,

    #[serde(skip)]
    pub import: ImportParameters,

    #[serde(flatten)]
    pub status: RunStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(index: usize, input: PathBuf, import: ImportParameters) -> Self {
        Self {
            index,
            run_id: run_id_for(&input),
            input,
            import,
            status: RunStatus::Pending,
            warnings: Vec::new(),
            artifacts: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RunStatus::Pending
    }

    /// Mark the run as handed to a worker at `at`
    pub fn start(&mut self, at: DateTime<Utc>) {
        self.status = RunStatus::Running;
        self.started_at = Some(at);
    }

    /// Mark the whole run as skipped
    pub fn skip(&mut self) {
        self.status = RunStatus::Skipped;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, cause: impl Into<String>) {
        self.status = RunStatus::Failed {
            cause: cause.into(),
        };
        self.finished_at = Some(Utc::now());
    }

    pub fn succeed(&mut self, artifacts: Vec<PathBuf>) {
        self.status = RunStatus::Succeeded;
        self.artifacts = artifacts;
        self.finished_at = Some(Utc::now());
    }
}

/// Run id of an input: the file name up to its first `.`
///
/// `tomo_01.rec.txt` becomes `tomo_01`. Names starting with a dot keep
/// their full name.
pub fn run_id_for(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}
