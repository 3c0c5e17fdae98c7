//! Run executor - applies a validated pipeline to one input file

use crate::{
    core::{
        error::{ExportError, RunError},
        operation::Capability,
        pipeline::ValidatedPipeline,
        run::PipelineRun,
    },
    execution::task_manager::TaskContext,
    io::{is_complete_artifact, Importer},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Executes the steps of a pipeline for a single run
///
/// Shared by every task of a batch; holds no per-run state.
pub struct RunExecutor {
    pipeline: Arc<ValidatedPipeline>,
    importer: Arc<dyn Importer>,
}

impl RunExecutor {
    pub fn new(pipeline: Arc<ValidatedPipeline>, importer: Arc<dyn Importer>) -> Self {
        Self { pipeline, importer }
    }

    pub fn pipeline(&self) -> &ValidatedPipeline {
        &self.pipeline
    }

    /// Import the input and run every step in order
    ///
    /// The first failing step ends the run. Returns the artifacts written by
    /// export steps.
    pub fn execute(&self, run: &PipelineRun, context: &mut TaskContext) -> Result<Vec<PathBuf>, RunError> {
        info!("Executing run: {} ({})", run.run_id, run.input.display());

        let mut geometry = self.importer.import(&run.input, &run.import)?;
        debug!(
            "Imported {} point(s) in {} cluster(s) from {}",
            geometry.point_count(),
            geometry.cluster_count(),
            run.input.display()
        );
        if geometry.is_empty() {
            context.warn(format!("{} contains no points", run.input.display()));
        }

        let mut artifacts = Vec::new();
        for step in self.pipeline.steps() {
            match &step.operation.capability {
                Capability::Transform(operation) => {
                    let was_empty = geometry.is_empty();
                    geometry = operation
                        .apply(geometry, &step.params)
                        .map_err(|source| RunError::Operation {
                            step: step.index,
                            operation: step.id().to_string(),
                            source,
                        })?;
                    if geometry.is_empty() && !was_empty {
                        context.warn(format!("step {} ({}) produced no data", step.index, step.id()));
                    }
                }
                Capability::Export(exporter) => {
                    let export_error = |source| RunError::Export {
                        step: step.index,
                        operation: step.id().to_string(),
                        source,
                    };
                    let written = exporter
                        .export(&geometry, &run.run_id, &step.params)
                        .map_err(export_error)?;
                    if let Some(path) = written.iter().find(|p| !is_complete_artifact(p)) {
                        return Err(export_error(ExportError::MissingArtifact { path: path.clone() }));
                    }
                    artifacts.extend(written);
                }
            }
            debug!(
                "Run {} step {} ({}) done, {} point(s) remain",
                run.run_id,
                step.index,
                step.id(),
                geometry.point_count()
            );
        }

        Ok(artifacts)
    }
}
