//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{OperationsCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Batch pipeline runner for membrane geometry
#[derive(Debug, Parser, Clone)]
#[command(name = "membatch")]
#[command(version)]
#[command(about = "Apply a validated processing pipeline to many input files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline over its inputs
    Run(RunCommand),

    /// Validate a pipeline configuration without touching any input
    Validate(ValidateCommand),

    /// List registered operations
    Operations(OperationsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
