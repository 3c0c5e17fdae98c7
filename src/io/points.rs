//! Plain-text point lists
//!
//! One point per line: `x y z` or `x y z label`, separated by whitespace or
//! commas. Lines starting with `#` are comments. Points sharing a label form
//! one cluster; unlabeled files import as a single cluster.

use crate::core::{
    error::{ExportError, ImportError},
    geometry::{Cluster, Geometry},
    operation::BoundParams,
};
use crate::io::{write_artifact, Exporter};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Parse a point list into geometry
pub fn parse(content: &str, path: &Path) -> Result<Geometry, ImportError> {
    let mut labeled: BTreeMap<i64, Vec<[f64; 3]>> = BTreeMap::new();
    let mut unlabeled = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();

        let corrupt = |reason: String| ImportError::Corrupt {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };

        if fields.len() != 3 && fields.len() != 4 {
            return Err(corrupt(format!("expected 3 or 4 columns, found {}", fields.len())));
        }

        let mut point = [0.0; 3];
        for (axis, field) in fields.iter().take(3).enumerate() {
            point[axis] = field
                .parse()
                .map_err(|_| corrupt(format!("invalid coordinate '{}'", field)))?;
        }

        match fields.get(3) {
            Some(label) => {
                let label: i64 = label
                    .parse()
                    .map_err(|_| corrupt(format!("invalid label '{}'", label)))?;
                labeled.entry(label).or_default().push(point);
            }
            None => unlabeled.push(point),
        }
    }

    let mut clusters: Vec<Cluster> = labeled.into_values().map(Cluster::new).collect();
    if !unlabeled.is_empty() {
        clusters.push(Cluster::new(unlabeled));
    }
    Ok(Geometry::from_clusters(clusters))
}

/// Render geometry as a labeled point list
pub fn render(geometry: &Geometry, delimiter: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# x{d}y{d}z{d}cluster", d = delimiter);
    for (label, cluster) in geometry.clusters.iter().enumerate() {
        for [x, y, z] in &cluster.points {
            let _ = writeln!(out, "{x}{d}{y}{d}{z}{d}{label}", d = delimiter);
        }
    }
    out
}

/// Exporter writing `<output_dir>/<run_id>.txt`
#[derive(Debug, Clone, Copy, Default)]
pub struct PointListExporter;

impl Exporter for PointListExporter {
    fn extension(&self) -> &str {
        "txt"
    }

    fn export(&self, geometry: &Geometry, run_id: &str, params: &BoundParams) -> Result<Vec<PathBuf>, ExportError> {
        let delimiter = match params.str("delimiter").unwrap_or("space") {
            "comma" => ",",
            "tab" => "\t",
            _ => " ",
        };
        let outputs = self.expected_outputs(run_id, params)?;
        for path in &outputs {
            write_artifact(path, &render(geometry, delimiter))?;
        }
        Ok(outputs)
    }
}
