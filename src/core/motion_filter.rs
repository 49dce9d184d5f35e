//! Motion filter for scan insertion throttling.
//!
//! Controls when accumulated scans are inserted into the submaps.
//! Requiring minimum motion between insertions keeps redundant
//! observations of a stationary platform from bloating the grids.
//!
//! # Insertion criteria
//!
//! A pose is *not* similar to the previously accepted one (and the scan
//! is inserted) when ANY of these hold:
//!
//! 1. **Time**: elapsed time exceeds the threshold
//! 2. **Distance**: planar translation exceeds the threshold
//! 3. **Rotation**: rotation angle exceeds the threshold
//!
//! The first pose is never similar. Non-similar poses update the stored
//! reference, so the gate measures motion since the last insertion.

use serde::{Deserialize, Serialize};

use super::rigid::Rigid3;

/// Thresholds for the motion filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionFilterConfig {
    /// Maximum time between insertions (seconds).
    ///
    /// Default: 5.0
    #[serde(default = "default_max_time_seconds")]
    pub max_time_seconds: f32,

    /// Translation that forces an insertion (meters).
    ///
    /// Default: 0.2
    #[serde(default = "default_max_distance_meters")]
    pub max_distance_meters: f32,

    /// Rotation that forces an insertion (radians).
    ///
    /// Default: 0.035 (~2 degrees)
    #[serde(default = "default_max_angle_radians")]
    pub max_angle_radians: f32,
}

fn default_max_time_seconds() -> f32 {
    5.0
}
fn default_max_distance_meters() -> f32 {
    0.2
}
fn default_max_angle_radians() -> f32 {
    0.035
}

impl Default for MotionFilterConfig {
    fn default() -> Self {
        Self {
            max_time_seconds: default_max_time_seconds(),
            max_distance_meters: default_max_distance_meters(),
            max_angle_radians: default_max_angle_radians(),
        }
    }
}

/// Rejects near-duplicate poses between insertions.
#[derive(Clone, Debug)]
pub struct MotionFilter {
    config: MotionFilterConfig,

    /// Last accepted (time, pose).
    last: Option<(u64, Rigid3)>,

    /// Poses seen in total.
    num_total: u64,

    /// Poses accepted (reference updated).
    num_different: u64,
}

impl MotionFilter {
    /// Create a filter with the given thresholds.
    pub fn new(config: MotionFilterConfig) -> Self {
        Self {
            config,
            last: None,
            num_total: 0,
            num_different: 0,
        }
    }

    /// True when `pose` is too similar to the last accepted pose.
    ///
    /// A `false` return updates the stored reference, so the caller
    /// should insert exactly when this returns `false`.
    pub fn is_similar(&mut self, timestamp_us: u64, pose: &Rigid3) -> bool {
        self.num_total += 1;

        if let Some((last_time, last_pose)) = self.last {
            let dt = (timestamp_us.saturating_sub(last_time)) as f32 / 1_000_000.0;
            let translation = {
                let d = pose.translation - last_pose.translation;
                (d.x * d.x + d.y * d.y).sqrt()
            };
            let rotation = (last_pose.rotation.inverse() * pose.rotation).angle();

            if dt < self.config.max_time_seconds
                && translation < self.config.max_distance_meters
                && rotation < self.config.max_angle_radians
            {
                return true;
            }
        }

        self.num_different += 1;
        self.last = Some((timestamp_us, *pose));
        false
    }

    /// Poses seen so far.
    #[inline]
    pub fn num_total(&self) -> u64 {
        self.num_total
    }

    /// Poses accepted so far.
    #[inline]
    pub fn num_different(&self) -> u64 {
        self.num_different
    }

    /// Fraction of poses accepted.
    pub fn acceptance_rate(&self) -> f32 {
        if self.num_total == 0 {
            1.0
        } else {
            self.num_different as f32 / self.num_total as f32
        }
    }
}
