//! Deterministic voxel downsampling of point sets.
//!
//! Two flavors:
//!
//! - [`voxel_filtered`]: fixed voxel edge length, keeps the first point
//!   that lands in each voxel. Deterministic across identical inputs,
//!   which keeps the matcher input stable between consecutive scans.
//! - [`AdaptiveVoxelFilter`]: searches for the coarsest voxel size that
//!   still retains a target number of points, so the matcher cost stays
//!   bounded on dense scans without starving on sparse ones.

use std::collections::HashSet;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Configuration for target-count-based voxel sizing of matcher input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdaptiveVoxelFilterConfig {
    /// Largest voxel edge length tried (meters).
    ///
    /// Default: 0.5
    #[serde(default = "default_max_length")]
    pub max_length: f32,

    /// Minimum number of points the filtered cloud must keep.
    ///
    /// Default: 200
    #[serde(default = "default_min_num_points")]
    pub min_num_points: usize,
}

fn default_max_length() -> f32 {
    0.5
}
fn default_min_num_points() -> usize {
    200
}

impl Default for AdaptiveVoxelFilterConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            min_num_points: default_min_num_points(),
        }
    }
}

/// Downsample by keeping the first point per voxel of edge length `size`.
pub fn voxel_filtered(points: &[Point3<f32>], size: f32) -> Vec<Point3<f32>> {
    if size <= 0.0 {
        return points.to_vec();
    }

    let inv_size = 1.0 / size;
    let mut seen: HashSet<(i64, i64, i64)> = HashSet::with_capacity(points.len());
    let mut result = Vec::with_capacity(points.len());

    for point in points {
        let key = (
            (point.x * inv_size).floor() as i64,
            (point.y * inv_size).floor() as i64,
            (point.z * inv_size).floor() as i64,
        );
        if seen.insert(key) {
            result.push(*point);
        }
    }

    result
}

/// Voxel filter that adapts its edge length to hit a point-count target.
#[derive(Clone, Debug)]
pub struct AdaptiveVoxelFilter {
    config: AdaptiveVoxelFilterConfig,
}

impl AdaptiveVoxelFilter {
    /// Create a filter with the given configuration.
    pub fn new(config: AdaptiveVoxelFilterConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AdaptiveVoxelFilterConfig {
        &self.config
    }

    /// Filter the cloud at the coarsest edge length that keeps at least
    /// `min_num_points` points.
    ///
    /// Inputs already at or below the target are returned unchanged. If
    /// even a very fine voxel cannot keep the target count (near-coincident
    /// points), the finest result is returned.
    pub fn filter(&self, points: &[Point3<f32>]) -> Vec<Point3<f32>> {
        if points.len() <= self.config.min_num_points {
            return points.to_vec();
        }

        let result = voxel_filtered(points, self.config.max_length);
        if result.len() >= self.config.min_num_points {
            return result;
        }

        // Halve the edge length until enough points survive, then bisect
        // between the last too-coarse and first fine-enough lengths.
        let mut high_length = self.config.max_length;
        let mut low_length = self.config.max_length / 2.0;
        loop {
            let candidate = voxel_filtered(points, low_length);
            if candidate.len() >= self.config.min_num_points {
                return self.bisect(points, low_length, high_length, candidate);
            }
            if low_length < 1e-3 {
                return candidate;
            }
            high_length = low_length;
            low_length /= 2.0;
        }
    }

    fn bisect(
        &self,
        points: &[Point3<f32>],
        mut low: f32,
        mut high: f32,
        mut best: Vec<Point3<f32>>,
    ) -> Vec<Point3<f32>> {
        // `low` always keeps enough points; push it toward `high` while
        // the count target still holds.
        while high - low > 1e-2 * low {
            let mid = 0.5 * (low + high);
            let candidate = voxel_filtered(points, mid);
            if candidate.len() >= self.config.min_num_points {
                low = mid;
                best = candidate;
            } else {
                high = mid;
            }
        }
        best
    }
}

impl Default for AdaptiveVoxelFilter {
    fn default() -> Self {
        Self::new(AdaptiveVoxelFilterConfig::default())
    }
}
