//! Test utility functions for membatch
#![allow(dead_code)]

use membatch::execution::BatchPlan;
use membatch::{BatchExecutor, BatchOptions, BatchReport, OperationRegistry, PipelineConfig, RunStatus, TaskManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Scratch directory holding inputs under `data/` and outputs under `out/`
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("data")).expect("create data dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root().join("data")
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Write a line of `count` points spaced 0.5 apart, so one cluster at distance 1.0
    pub fn write_points(&self, name: &str, count: usize) -> PathBuf {
        let content: String = (0..count)
            .map(|i| format!("{} 0.0 0.0\n", i as f64 * 0.5))
            .collect();
        self.write_input(name, &content)
    }

    pub fn write_input(&self, name: &str, content: &str) -> PathBuf {
        let path = self.data_dir().join(name);
        std::fs::write(&path, content).expect("write input");
        path
    }

    /// Place an existing output as a previous batch would have
    pub fn write_output(&self, name: &str, content: &str) -> PathBuf {
        std::fs::create_dir_all(self.out_dir()).expect("create out dir");
        let path = self.out_dir().join(name);
        std::fs::write(&path, content).expect("write output");
        path
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.out_dir().join(name)
    }

    /// Cluster, drop clusters under `min_points`, export STAR into `out/`
    pub fn star_config(&self, min_points: usize) -> PipelineConfig {
        let yaml = format!(
            r#"
name: "membrane batch"
inputs:
  directory: '{data}'
  pattern: '\.txt$'
steps:
  - operation: connected_components
  - operation: filter_min_points
    parameters:
      min_points: {min_points}
  - operation: export_star
    parameters:
      output_dir: '{out}'
"#,
            data = self.data_dir().display(),
            out = self.out_dir().display(),
            min_points = min_points,
        );
        PipelineConfig::from_yaml(&yaml).expect("valid config")
    }
}

pub fn executor() -> BatchExecutor {
    BatchExecutor::new(Arc::new(OperationRegistry::builtin().expect("builtin registry")))
}

pub fn plan(config: &PipelineConfig, skip_complete: bool) -> BatchPlan {
    let options = BatchOptions {
        workers: 2,
        skip_complete,
    };
    executor().plan(config, &options).expect("plan")
}

/// Plan and run a whole batch with `workers` parallel runs
pub async fn run_batch(config: &PipelineConfig, workers: usize, skip_complete: bool) -> BatchReport {
    let executor = executor();
    let options = BatchOptions {
        workers,
        skip_complete,
    };
    let plan = executor.plan(config, &options).expect("plan");

    let mut manager = TaskManager::new(workers).expect("task manager");
    let report = executor.run(plan, &mut manager, workers).await.expect("batch run");
    manager.shutdown().await;
    report
}

/// Status of `run_id` in a report
pub fn status_of<'a>(report: &'a BatchReport, run_id: &str) -> &'a RunStatus {
    report
        .runs
        .iter()
        .find(|r| r.run_id == run_id)
        .map(|r| &r.status)
        .unwrap_or_else(|| panic!("no run '{}' in report", run_id))
}
