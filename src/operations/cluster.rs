//! Clustering and cluster selection

use crate::core::{
    error::OperationError,
    geometry::{Cluster, Geometry, Point},
    operation::BoundParams,
};
use std::collections::HashMap;

/// Group points whose per-axis distance is within `distance`
///
/// Points are hashed into cubic cells of edge `distance`; only the 27
/// neighbouring cells are compared, then linked points are merged with a
/// union-find.
pub fn connected_components(geometry: Geometry, params: &BoundParams) -> Result<Geometry, OperationError> {
    let distance = params.f64("distance")?;
    if !(distance > 0.0) {
        return Err(OperationError::InvalidParameter {
            parameter: "distance".to_string(),
            reason: format!("must be positive, got {}", distance),
        });
    }

    let sampling_rate = geometry.sampling_rate;
    let metadata = geometry.metadata.clone();
    let points = geometry.into_points();

    let mut cells = Vec::with_capacity(points.len());
    for point in &points {
        let cell = cell_of(point, distance).ok_or_else(|| OperationError::InvalidParameter {
            parameter: "distance".to_string(),
            reason: format!(
                "{} is too small for point ({}, {}, {})",
                distance, point[0], point[1], point[2]
            ),
        })?;
        cells.push(cell);
    }

    let mut grid: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
    for (idx, cell) in cells.iter().enumerate() {
        grid.entry(*cell).or_default().push(idx);
    }

    let mut sets = DisjointSets::new(points.len());
    for (idx, point) in points.iter().enumerate() {
        let [cx, cy, cz] = cells[idx];
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbour = match (cx.checked_add(dx), cy.checked_add(dy), cz.checked_add(dz)) {
                        (Some(x), Some(y), Some(z)) => [x, y, z],
                        _ => continue,
                    };
                    let Some(members) = grid.get(&neighbour) else {
                        continue;
                    };
                    for &other in members.iter().filter(|&&o| o > idx) {
                        if within(point, &points[other], distance) {
                            sets.union(idx, other);
                        }
                    }
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<Point>> = HashMap::new();
    let mut order = Vec::new();
    for (idx, point) in points.iter().enumerate() {
        let root = sets.find(idx);
        groups
            .entry(root)
            .or_insert_with(|| {
                order.push(root);
                Vec::new()
            })
            .push(*point);
    }

    let clusters = order
        .into_iter()
        .filter_map(|root| groups.remove(&root))
        .map(Cluster::new)
        .collect();

    let mut out = Geometry::from_clusters(clusters).with_sampling_rate(sampling_rate);
    out.metadata = metadata;
    Ok(out)
}

/// Keep clusters with `min_points <= len <= max_points`
pub fn filter_by_size(mut geometry: Geometry, params: &BoundParams) -> Result<Geometry, OperationError> {
    let min_points = params.u64("min_points")? as usize;
    let max_points = params.opt_u64("max_points")?.map(|v| v as usize);

    if let Some(max) = max_points {
        if max < min_points {
            return Err(OperationError::InvalidParameter {
                parameter: "max_points".to_string(),
                reason: format!("{} is smaller than min_points {}", max, min_points),
            });
        }
    }

    geometry.clusters.retain(|cluster| {
        cluster.len() >= min_points && max_points.map_or(true, |max| cluster.len() <= max)
    });
    Ok(geometry)
}

/// Grid cell of `p`, or `None` when an index does not fit in `i64`
fn cell_of(p: &Point, distance: f64) -> Option<[i64; 3]> {
    let mut cell = [0i64; 3];
    for (axis, coordinate) in p.iter().enumerate() {
        let index = (coordinate / distance).floor();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        if !index.is_finite() || index < i64::MIN as f64 || index >= i64::MAX as f64 {
            return None;
        }
        cell[axis] = index as i64;
    }
    Some(cell)
}

fn within(a: &Point, b: &Point, distance: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= distance)
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut idx: usize) -> usize {
        while self.parent[idx] != idx {
            self.parent[idx] = self.parent[self.parent[idx]];
            idx = self.parent[idx];
        }
        idx
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = rb.min(ra);
        }
    }
}
