//! File collaborators: importing inputs and exporting run outputs

pub mod points;
pub mod star;

use crate::core::{
    error::{ExportError, ImportError},
    geometry::Geometry,
    operation::BoundParams,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-file import adjustments applied to raw coordinates
///
/// Coordinates become `(p - offset) * scale`; `sampling_rate` is recorded
/// on the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportParameters {
    #[serde(default)]
    pub offset: f64,

    #[serde(default = "one")]
    pub scale: f64,

    #[serde(default = "one")]
    pub sampling_rate: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for ImportParameters {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
            sampling_rate: 1.0,
        }
    }
}

impl ImportParameters {
    fn apply(&self, geometry: Geometry) -> Geometry {
        let mut geometry = geometry.with_sampling_rate(self.sampling_rate);
        if self.offset != 0.0 || self.scale != 1.0 {
            for cluster in &mut geometry.clusters {
                for point in &mut cluster.points {
                    for axis in point.iter_mut() {
                        *axis = (*axis - self.offset) * self.scale;
                    }
                }
            }
        }
        geometry
    }
}

/// Turns an input path into geometry
pub trait Importer: Send + Sync {
    fn import(&self, path: &Path, params: &ImportParameters) -> Result<Geometry, ImportError>;
}

/// Writes geometry to disk
///
/// Exporters own the mapping from run id to output paths so the batch
/// executor can test for existing outputs without running anything.
pub trait Exporter: Send + Sync {
    /// File extension written by this exporter, without the dot
    fn extension(&self) -> &str;

    /// Paths this exporter will produce for a run
    fn expected_outputs(&self, run_id: &str, params: &BoundParams) -> Result<Vec<PathBuf>, ExportError> {
        let dir = params.path("output_dir")?;
        Ok(vec![dir.join(format!("{}.{}", run_id, self.extension()))])
    }

    /// Write `geometry` and return the produced artifacts
    fn export(&self, geometry: &Geometry, run_id: &str, params: &BoundParams) -> Result<Vec<PathBuf>, ExportError>;
}

/// Importer dispatching on file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImporter;

impl Importer for FileImporter {
    fn import(&self, path: &Path, params: &ImportParameters) -> Result<Geometry, ImportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let content = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let geometry = match extension.as_str() {
            "star" => star::parse(&content, path)?,
            "txt" | "xyz" | "csv" | "tsv" => points::parse(&content, path)?,
            _ => {
                return Err(ImportError::Unsupported {
                    path: path.to_path_buf(),
                    extension,
                })
            }
        };

        let mut geometry = params.apply(geometry);
        geometry
            .metadata
            .insert("source".to_string(), path.display().to_string());
        Ok(geometry)
    }
}

/// Write `content` to `path`, creating the parent directory
pub(crate) fn write_artifact(path: &Path, content: &str) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether `path` exists and holds at least one byte
pub fn is_complete_artifact(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_import_applies_offset_and_scale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("membrane.txt");
        std::fs::write(&path, "10 20 30\n").unwrap();

        let params = ImportParameters {
            offset: 10.0,
            scale: 0.5,
            sampling_rate: 4.0,
        };
        let geometry = FileImporter.import(&path, &params).unwrap();
        assert_eq!(geometry.clusters[0].points[0], [0.0, 5.0, 10.0]);
        assert_eq!(geometry.sampling_rate, 4.0);
        assert!(geometry.metadata["source"].ends_with("membrane.txt"));
    }

    #[test]
    fn test_import_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("volume.mrc");
        std::fs::write(&path, "binary").unwrap();

        let result = FileImporter.import(&path, &ImportParameters::default());
        assert!(matches!(result, Err(ImportError::Unsupported { .. })));
    }

    #[test]
    fn test_import_missing_file() {
        let result = FileImporter.import(Path::new("/nonexistent/input.txt"), &ImportParameters::default());
        assert!(matches!(result, Err(ImportError::Io { .. })));
    }

    #[test]
    fn test_complete_artifact_requires_content() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.star");
        std::fs::write(&empty, "").unwrap();
        let full = dir.path().join("full.star");
        std::fs::write(&full, "data_\n").unwrap();

        assert!(!is_complete_artifact(&empty));
        assert!(is_complete_artifact(&full));
        assert!(!is_complete_artifact(&dir.path().join("missing.star")));
    }
}
