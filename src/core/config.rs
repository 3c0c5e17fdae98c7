//! Pipeline configuration from YAML or JSON

use crate::core::pipeline::{OperationInstance, Pipeline};
use crate::io::ImportParameters;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration document
///
/// Produced by an interactive builder or written by hand, consumed by the
/// headless runner. Serializing and reading back yields an equal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Where the input files come from
    #[serde(default)]
    pub inputs: InputConfig,

    /// Pipeline steps in execution order
    pub steps: Vec<OperationInstance>,

    /// Global execution settings
    #[serde(default)]
    pub settings: ExecutionSettings,
}

/// Input file selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Explicit input files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,

    /// Directory scanned once at batch start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Regex matched against file names found in `directory`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Import parameters keyed by path or file name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ImportParameters>,
}

impl InputConfig {
    /// Import parameters for `path`; full path wins over file name
    pub fn import_parameters(&self, path: &Path) -> ImportParameters {
        let by_path = self.parameters.get(&*path.to_string_lossy());
        let by_name = || {
            path.file_name()
                .and_then(|name| self.parameters.get(&*name.to_string_lossy()))
        };
        by_path.or_else(by_name).copied().unwrap_or_default()
    }
}

/// Batch execution settings; CLI flags override these
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Worker slots used for runs
    #[serde(default = "default_workers")]
    pub parallel_workers: usize,

    /// Skip runs whose outputs already exist
    #[serde(default)]
    pub skip_complete: bool,
}

fn default_workers() -> usize {
    1
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            parallel_workers: default_workers(),
            skip_complete: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file; `.json` is read as JSON, anything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml).context("Invalid YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json).context("Invalid JSON configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document, format chosen by extension as in [`Self::from_file`]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let content = if is_json { self.to_json()? } else { self.to_yaml()? };
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Check settings that do not depend on the operation registry
    ///
    /// Step composition is checked separately by the validator.
    pub fn validate(&self) -> Result<()> {
        if self.settings.parallel_workers == 0 {
            anyhow::bail!("parallel_workers must be at least 1");
        }

        if let Some(pattern) = &self.inputs.pattern {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid input pattern '{}'", pattern))?;
        }

        if self.inputs.pattern.is_some() && self.inputs.directory.is_none() {
            anyhow::bail!("inputs.pattern requires inputs.directory");
        }

        Ok(())
    }

    /// Name shown in logs and reports
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| "pipeline".to_string())
    }

    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
