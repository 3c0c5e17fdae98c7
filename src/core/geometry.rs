//! Geometry payload passed between pipeline steps

use std::collections::BTreeMap;

/// A single 3D coordinate
pub type Point = [f64; 3];

/// A group of points belonging together (e.g. one membrane segment)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cluster {
    pub points: Vec<Point>,
}

impl Cluster {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Data owned by a run while it moves through the pipeline
///
/// Imported files start out as a single cluster holding every point;
/// clustering steps split it, filtering steps drop clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Point groups in this geometry
    pub clusters: Vec<Cluster>,

    /// Sampling rate the coordinates are expressed in
    pub sampling_rate: f64,

    /// Free-form metadata carried along (source file, header values, ...)
    pub metadata: BTreeMap<String, String>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            sampling_rate: 1.0,
            metadata: BTreeMap::new(),
        }
    }
}

impl Geometry {
    /// Create a geometry with all points in one cluster
    pub fn from_points(points: Vec<Point>) -> Self {
        let clusters = if points.is_empty() {
            Vec::new()
        } else {
            vec![Cluster::new(points)]
        };
        Self {
            clusters,
            ..Self::default()
        }
    }

    /// Create a geometry from pre-grouped clusters
    pub fn from_clusters(clusters: Vec<Cluster>) -> Self {
        Self {
            clusters,
            ..Self::default()
        }
    }

    pub fn with_sampling_rate(mut self, sampling_rate: f64) -> Self {
        self.sampling_rate = sampling_rate;
        self
    }

    /// Total number of points over all clusters
    pub fn point_count(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Iterate over every point regardless of cluster membership
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.clusters.iter().flat_map(|c| c.points.iter())
    }

    /// Consume the geometry and return all points in one flat list
    pub fn into_points(self) -> Vec<Point> {
        self.clusters.into_iter().flat_map(|c| c.points).collect()
    }
}
