//! # MargaSLAM
//!
//! Local trajectory builder for 2D LiDAR SLAM: the online front end that
//! fuses an IMU, wheel odometry and horizontal range-finder returns into
//! a continuously updated pose estimate while building local occupancy
//! submaps.
//!
//! ## Overview
//!
//! - **Dead reckoning**: gravity-aligned orientation tracking plus a
//!   constant-velocity model, corrected by wheel odometry through a
//!   Kalman-style pose filter.
//! - **Scan matching**: a two-stage matcher (optional correlative grid
//!   search, then damped Gauss-Newton refinement) aligns every
//!   accumulated scan against the current submap.
//! - **Submaps**: evidence accumulates into an active pair of log-odds
//!   occupancy grids that rotates on a scan-count threshold.
//!
//! Loop closure and pose-graph optimization are external consumers of
//! the emitted [`InsertionResult`]s; this crate does not provide them.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use marga_slam::{LocalTrajectoryBuilder, LocalTrajectoryConfig, RangeData};
//!
//! let mut builder = LocalTrajectoryBuilder::new(LocalTrajectoryConfig::default());
//!
//! // Feed sensor streams in time order.
//! builder.add_imu(t, linear_acceleration, angular_velocity, orientation);
//! builder.add_odometer(t, &odometer_pose);
//! if let Some(result) = builder.add_horizontal_range(t, &scan) {
//!     // Hand the insertion result to the pose graph.
//! }
//! ```
//!
//! ## Coordinate system
//!
//! ROS REP-103: X forward, Y left, Z up; yaw CCW positive from +X.
//! Timestamps are microseconds.

#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod grid;
pub mod matching;
pub mod submap;
pub mod trajectory;

pub use crate::config::{ConfigError, LocalTrajectoryConfig};
pub use crate::core::{
    normalize_angle, yaw_of, AdaptiveVoxelFilter, AdaptiveVoxelFilterConfig, MotionFilter,
    MotionFilterConfig, OdometryState, OdometryStateTracker, OrientationTracker, PoseCovariance,
    PoseFilter, PoseFilterConfig, Pose2D, RangeData, Rigid3,
};
pub use crate::grid::{GridCoord, LogOddsParams, ProbabilityGrid};
pub use crate::matching::{
    CorrelativeMatcher, CorrelativeMatcherConfig, GaussNewtonMatcher, GaussNewtonMatcherConfig,
    MatchSummary,
};
pub use crate::submap::{ActiveSubmaps, Submap, SubmapConfig};
pub use crate::trajectory::{
    InsertionResult, LocalTrajectoryBuilder, PoseEstimate, RangeAccumulator,
};
