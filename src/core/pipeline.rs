//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    error::{CompositionError, ExportError},
    operation::{BoundParams, Capability, OperationDescriptor, Parameters},
    registry::OperationRegistry,
    validator,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// One step of a pipeline as written by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInstance {
    /// Registered operation id
    pub operation: String,

    /// Raw parameter values
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

impl OperationInstance {
    pub fn new(operation: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            operation: operation.into(),
            parameters,
        }
    }
}

/// An ordered chain of operation instances, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Steps in execution order
    pub steps: Vec<OperationInstance>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn with_step(mut self, step: OperationInstance) -> Self {
        self.steps.push(step);
        self
    }

    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            name: config.display_name(),
            steps: config.steps.clone(),
        }
    }

    /// Check the pipeline against the registry; see [`validator::validate`]
    pub fn validate(&self, registry: &OperationRegistry) -> Result<ValidatedPipeline, CompositionError> {
        validator::validate(self, registry)
    }
}

/// A resolved step with its parameters checked and defaulted
#[derive(Debug, Clone)]
pub struct ValidatedStep {
    /// Zero-based position in the pipeline
    pub index: usize,
    pub operation: Arc<OperationDescriptor>,
    pub params: BoundParams,
}

impl ValidatedStep {
    pub fn id(&self) -> &str {
        &self.operation.id
    }
}

/// A pipeline that passed validation; the only form that can be executed
#[derive(Debug, Clone)]
pub struct ValidatedPipeline {
    name: String,
    steps: Vec<ValidatedStep>,
}

impl ValidatedPipeline {
    pub(crate) fn new(name: String, steps: Vec<ValidatedStep>) -> Self {
        Self { name, steps }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[ValidatedStep] {
        &self.steps
    }

    /// Whether any step writes artifacts
    pub fn has_exports(&self) -> bool {
        self.steps.iter().any(|s| s.operation.is_export())
    }

    /// Every artifact the export steps will write for `run_id`
    pub fn expected_outputs(&self, run_id: &str) -> Result<Vec<PathBuf>, ExportError> {
        let mut outputs = Vec::new();
        for step in &self.steps {
            if let Capability::Export(exporter) = &step.operation.capability {
                outputs.extend(exporter.expected_outputs(run_id, &step.params)?);
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_keeps_step_order() {
        let yaml = r#"
name: "ordering"
steps:
  - operation: connected_components
  - operation: filter_min_points
    parameters:
      min_points: 10
  - operation: export_star
    parameters:
      output_dir: out
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let pipeline = config.to_pipeline();

        let ids: Vec<_> = pipeline.steps.iter().map(|s| s.operation.as_str()).collect();
        assert_eq!(ids, vec!["connected_components", "filter_min_points", "export_star"]);
        assert_eq!(pipeline.name, "ordering");
    }

    #[test]
    fn test_expected_outputs_cover_every_export() {
        let yaml = r#"
steps:
  - operation: connected_components
  - operation: export_star
    parameters:
      output_dir: /data/star
  - operation: export_points
    parameters:
      output_dir: /data/points
"#;
        let registry = OperationRegistry::builtin().unwrap();
        let validated = PipelineConfig::from_yaml(yaml)
            .unwrap()
            .to_pipeline()
            .validate(&registry)
            .unwrap();

        assert_eq!(
            validated.expected_outputs("tomo_07").unwrap(),
            vec![
                PathBuf::from("/data/star/tomo_07.star"),
                PathBuf::from("/data/points/tomo_07.txt"),
            ]
        );
    }

    #[test]
    fn test_pipeline_without_export_has_no_outputs() {
        let registry = OperationRegistry::builtin().unwrap();
        let validated = Pipeline::new("no export")
            .with_step(OperationInstance::new("connected_components", Parameters::new()))
            .validate(&registry)
            .unwrap();

        assert!(!validated.has_exports());
        assert!(validated.expected_outputs("a").unwrap().is_empty());
    }
}
