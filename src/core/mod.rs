//! Core types for the local trajectory builder.
//!
//! Coordinate convention follows ROS REP-103:
//! - **X-axis**: forward
//! - **Y-axis**: left
//! - **Z-axis**: up
//! - **Yaw/theta**: CCW positive from +X, radians
//!
//! Timestamps are microseconds (`u64`) throughout; all streams feeding a
//! builder must be monotonically non-decreasing in time.
//!
//! ## Type categories
//!
//! ### Transforms
//! - [`Pose2D`]: planar pose (x, y, theta)
//! - [`Rigid3`]: quaternion rotation + 3D translation, with
//!   [`Rigid3::project_2d`] / [`Rigid3::embed_3d`] between the two
//!
//! ### Sensor data
//! - [`RangeData`]: origin + returns + misses in a shared frame
//! - [`voxel_filtered`] / [`AdaptiveVoxelFilter`]: deterministic
//!   downsampling
//!
//! ### State estimation
//! - [`OrientationTracker`]: gravity-aligned orientation from IMU
//! - [`PoseFilter`]: Kalman-style 6-DoF pose with covariance
//! - [`OdometryStateTracker`]: bounded odometry/state correspondence ring
//! - [`MotionFilter`]: insertion gating by minimum motion

mod imu_tracker;
mod motion_filter;
mod odometry_tracker;
mod pose_filter;
mod range_data;
mod rigid;
mod voxel_filter;

pub use imu_tracker::OrientationTracker;
pub use motion_filter::{MotionFilter, MotionFilterConfig};
pub use odometry_tracker::{OdometryState, OdometryStateTracker};
pub use pose_filter::{PoseCovariance, PoseFilter, PoseFilterConfig};
pub use range_data::RangeData;
pub use rigid::{normalize_angle, yaw_of, Pose2D, Rigid3};
pub use voxel_filter::{voxel_filtered, AdaptiveVoxelFilter, AdaptiveVoxelFilterConfig};
