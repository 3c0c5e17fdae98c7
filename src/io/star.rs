//! Minimal STAR (RELION) particle tables
//!
//! Only the `loop_` block with `_rlnCoordinateX/Y/Z` is understood. An
//! optional `_rlnClassNumber` column assigns points to clusters.

use crate::core::{
    error::{ExportError, ImportError},
    geometry::{Cluster, Geometry},
    operation::BoundParams,
};
use crate::io::{write_artifact, Exporter};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

const COORDINATES: [&str; 3] = ["_rlnCoordinateX", "_rlnCoordinateY", "_rlnCoordinateZ"];
const CLASS: &str = "_rlnClassNumber";

/// Parse a STAR particle table
pub fn parse(content: &str, path: &Path) -> Result<Geometry, ImportError> {
    let corrupt = |line: usize, reason: &str| ImportError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    };

    let mut columns: Vec<String> = Vec::new();
    let mut in_loop = false;
    let mut rows: Vec<(usize, Vec<&str>)> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "loop_" {
            in_loop = true;
            columns.clear();
            rows.clear();
            continue;
        }
        if line.starts_with("data_") {
            in_loop = false;
            continue;
        }
        if !in_loop {
            continue;
        }
        if line.starts_with('_') {
            if !rows.is_empty() {
                return Err(corrupt(idx + 1, "column label after data rows"));
            }
            let label = line.split_whitespace().next().unwrap_or_default();
            columns.push(label.to_string());
        } else {
            rows.push((idx + 1, line.split_whitespace().collect()));
        }
    }

    let position = |label: &str| columns.iter().position(|c| c == label);
    let mut axes = [0usize; 3];
    for (axis, label) in COORDINATES.iter().enumerate() {
        axes[axis] = position(label).ok_or_else(|| ImportError::MissingColumn {
            path: path.to_path_buf(),
            column: label.to_string(),
        })?;
    }
    let class_column = position(CLASS);

    let mut clusters: BTreeMap<i64, Vec<[f64; 3]>> = BTreeMap::new();
    for (line, fields) in rows {
        if fields.len() != columns.len() {
            return Err(corrupt(
                line,
                &format!("expected {} fields, found {}", columns.len(), fields.len()),
            ));
        }
        let mut point = [0.0; 3];
        for (axis, column) in axes.iter().enumerate() {
            point[axis] = fields[*column]
                .parse()
                .map_err(|_| corrupt(line, &format!("invalid coordinate '{}'", fields[*column])))?;
        }
        let class = match class_column {
            Some(column) => fields[column]
                .parse()
                .map_err(|_| corrupt(line, &format!("invalid class '{}'", fields[column])))?,
            None => 1,
        };
        clusters.entry(class).or_default().push(point);
    }

    Ok(Geometry::from_clusters(
        clusters.into_values().map(Cluster::new).collect(),
    ))
}

/// Render geometry as a single STAR table, class numbers starting at 1
pub fn render(geometry: &Geometry) -> String {
    let mut out = String::from("\ndata_particles\n\nloop_\n");
    for (idx, label) in COORDINATES.iter().chain([CLASS].iter()).enumerate() {
        let _ = writeln!(out, "{} #{}", label, idx + 1);
    }
    for (idx, cluster) in geometry.clusters.iter().enumerate() {
        for [x, y, z] in &cluster.points {
            let _ = writeln!(out, "{:.3}\t{:.3}\t{:.3}\t{}", x, y, z, idx + 1);
        }
    }
    out
}

/// Exporter writing `<output_dir>/<run_id>.star`
#[derive(Debug, Clone, Copy, Default)]
pub struct StarExporter;

impl Exporter for StarExporter {
    fn extension(&self) -> &str {
        "star"
    }

    fn export(&self, geometry: &Geometry, run_id: &str, params: &BoundParams) -> Result<Vec<PathBuf>, ExportError> {
        let outputs = self.expected_outputs(run_id, params)?;
        let content = render(geometry);
        for path in &outputs {
            write_artifact(path, &content)?;
        }
        Ok(outputs)
    }
}
