//! CLI command definitions

use crate::core::config::ExecutionSettings;
use crate::execution::BatchOptions;
use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline configuration (YAML, or JSON by extension)
    pub config: PathBuf,

    /// Parallel workers; overrides the configuration
    #[arg(short, long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Skip inputs whose outputs already exist
    #[arg(long)]
    pub skip_complete: bool,

    /// Only report how many runs would execute
    #[arg(long, conflicts_with = "index")]
    pub dry_run: bool,

    /// Execute only this run of the filtered list (cluster job arrays)
    #[arg(long)]
    pub index: Option<usize>,

    /// Write a JSON report of every run
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunCommand {
    /// Merge flags over document settings
    ///
    /// `--workers` replaces the configured count; `--skip-complete` can only
    /// switch skipping on.
    pub fn options(&self, settings: ExecutionSettings) -> BatchOptions {
        BatchOptions {
            workers: self.workers.unwrap_or(settings.parallel_workers),
            skip_complete: self.skip_complete || settings.skip_complete,
        }
    }
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline configuration
    pub config: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered operations
#[derive(Debug, Args, Clone)]
pub struct OperationsCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse a worker count of at least one
pub fn parse_workers(s: &str) -> Result<usize, String> {
    let workers: usize = s.parse().map_err(|_| format!("Invalid worker count: {}", s))?;
    if workers == 0 {
        return Err("Worker count must be at least 1".to_string());
    }
    Ok(workers)
}
