//! The local trajectory front end.
//!
//! [`LocalTrajectoryBuilder`] is the orchestrator: it consumes IMU,
//! odometry and range streams, maintains the fused pose, and emits an
//! [`InsertionResult`] every time an accumulated scan passes the motion
//! gate and lands in the active submaps. A global trajectory builder
//! (pose graph) consumes the results; this crate does not include one.

mod accumulator;
mod builder;

use std::sync::Arc;

use nalgebra::Point3;

use crate::core::{Pose2D, RangeData, Rigid3};
use crate::submap::Submap;

pub use accumulator::RangeAccumulator;
pub use builder::LocalTrajectoryBuilder;

/// Record emitted for every scan inserted into the submaps.
#[derive(Clone)]
pub struct InsertionResult {
    /// Arrival time of the range data that triggered the insertion.
    pub timestamp_us: u64,
    /// Snapshot of the active submaps the scan landed in (one during
    /// the bootstrap half-window, two thereafter); index 0 was the
    /// matching target.
    pub insertion_submaps: Vec<Arc<Submap>>,
    /// Gravity-alignment rotation used for this scan.
    pub tracking_to_tracking_2d: Rigid3,
    /// The filtered composite scan in the 2D tracking frame.
    pub range_data_in_tracking_2d: RangeData,
    /// The accepted 2D pose of the scan in the map frame.
    pub pose_estimate_2d: Pose2D,
}

/// The last scan-match result.
#[derive(Clone, Debug)]
pub struct PoseEstimate {
    /// Time of the matched scan.
    pub timestamp_us: u64,
    /// Fused 3D pose in the map frame.
    pub pose: Rigid3,
    /// The matched returns transformed into the map frame.
    pub point_cloud: Vec<Point3<f32>>,
}
