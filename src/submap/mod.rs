//! Active submap pair management.
//!
//! The trajectory builder accumulates evidence into an ordered pair of
//! occupancy submaps:
//!
//! - **Index 0** is the matching target: the long-lived submap the scan
//!   matcher aligns against.
//! - **Index 1** is younger and overlaps the older one, so that when the
//!   pair rotates the promoted matching target already holds half a
//!   window of evidence.
//!
//! The first submap exists from construction. The second is appended
//! once the first holds half a `num_range_data` window; from then on
//! every insertion lands in both. When the matching target's scan count
//! reaches `num_range_data`, it is finalized and dropped, the younger
//! submap shifts to index 0, and a fresh submap centered at the
//! insertion origin is appended.
//!
//! Sharing model: submaps are handed out as `Arc` snapshots. Insertion
//! goes through copy-on-write, so a consumer holding a snapshot keeps an
//! immutable view while the producer continues updating its own copy,
//! and finalized submaps stay readable after eviction.

use std::sync::Arc;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::core::RangeData;
use crate::grid::{insert_range_data, LogOddsParams, ProbabilityGrid};

/// Configuration for submap construction and rotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmapConfig {
    /// Grid resolution in meters per cell.
    ///
    /// Default: 0.05
    #[serde(default = "default_resolution")]
    pub resolution: f32,

    /// Submap grid edge length in cells (square).
    ///
    /// Default: 400 (20 m at 5 cm)
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,

    /// Scan count at which the pair rotates.
    ///
    /// Default: 90
    #[serde(default = "default_num_range_data")]
    pub num_range_data: usize,

    /// Occupancy probability applied per hit observation.
    ///
    /// Default: 0.55
    #[serde(default = "default_hit_probability")]
    pub hit_probability: f32,

    /// Occupancy probability applied per miss observation.
    ///
    /// Default: 0.49
    #[serde(default = "default_miss_probability")]
    pub miss_probability: f32,
}

fn default_resolution() -> f32 {
    0.05
}
fn default_grid_size() -> usize {
    400
}
fn default_num_range_data() -> usize {
    90
}
fn default_hit_probability() -> f32 {
    0.55
}
fn default_miss_probability() -> f32 {
    0.49
}

impl Default for SubmapConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            grid_size: default_grid_size(),
            num_range_data: default_num_range_data(),
            hit_probability: default_hit_probability(),
            miss_probability: default_miss_probability(),
        }
    }
}

/// A growing occupancy grid with its insertion count and lifecycle flag.
#[derive(Clone, Debug)]
pub struct Submap {
    grid: ProbabilityGrid,
    num_range_data: usize,
    finished: bool,
}

impl Submap {
    fn new(config: &SubmapConfig, center: Point2<f32>) -> Self {
        let params =
            LogOddsParams::from_probabilities(config.hit_probability, config.miss_probability);
        Self {
            grid: ProbabilityGrid::centered(config.grid_size, config.resolution, center, params),
            num_range_data: 0,
            finished: false,
        }
    }

    /// Read access to the occupancy grid.
    #[inline]
    pub fn grid(&self) -> &ProbabilityGrid {
        &self.grid
    }

    /// Number of scans inserted so far.
    #[inline]
    pub fn num_range_data(&self) -> usize {
        self.num_range_data
    }

    /// True once the submap is finalized (read-only from then on).
    #[inline]
    pub fn finished(&self) -> bool {
        self.finished
    }

    fn insert(&mut self, range_data: &RangeData) {
        debug_assert!(!self.finished, "insertion into a finalized submap");
        insert_range_data(&mut self.grid, range_data);
        self.num_range_data += 1;
    }
}

/// The ordered submaps (at most two) currently receiving insertions.
pub struct ActiveSubmaps {
    config: SubmapConfig,
    submaps: Vec<Arc<Submap>>,
}

impl ActiveSubmaps {
    /// Create the set with its first submap centered at the map origin,
    /// so the matching target is available before the first query.
    pub fn new(config: SubmapConfig) -> Self {
        let submaps = vec![Arc::new(Submap::new(&config, Point2::new(0.0, 0.0)))];
        Self { config, submaps }
    }

    /// The active submaps; index 0 is the matching target.
    #[inline]
    pub fn submaps(&self) -> &[Arc<Submap>] {
        &self.submaps
    }

    /// The matching target.
    #[inline]
    pub fn matching_submap(&self) -> &Arc<Submap> {
        &self.submaps[0]
    }

    /// Insert `range_data` (in the map frame) into every active submap.
    ///
    /// The matching target is finalized and dropped when its count
    /// reaches `num_range_data`; the younger submap is promoted and a
    /// fresh submap centered at the insertion origin is appended. During
    /// bootstrap, the second submap is appended once the first holds
    /// half a window, which staggers the pair so the rotation trigger
    /// never sees two submaps with equal counts.
    ///
    /// Returns a snapshot of the submaps the scan landed in. The
    /// snapshot is frozen: later insertions go copy-on-write and do not
    /// mutate it. When the insertion triggered a rotation, the
    /// snapshot's older submap is already marked finished.
    pub fn insert_range_data(&mut self, range_data: &RangeData) -> Vec<Arc<Submap>> {
        for submap in &mut self.submaps {
            Arc::make_mut(submap).insert(range_data);
        }

        let rotate = self.submaps[0].num_range_data() >= self.config.num_range_data;
        if rotate {
            Arc::make_mut(&mut self.submaps[0]).finished = true;
        }

        let snapshot = self.submaps.to_vec();
        let origin = Point2::new(range_data.origin.x, range_data.origin.y);

        if rotate {
            self.submaps.remove(0);
            self.submaps.push(Arc::new(Submap::new(&self.config, origin)));
        } else if self.submaps.len() == 1
            && self.submaps[0].num_range_data() >= self.config.num_range_data / 2
        {
            self.submaps.push(Arc::new(Submap::new(&self.config, origin)));
        }

        snapshot
    }
}
