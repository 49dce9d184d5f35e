//! Unified configuration for the local trajectory builder.
//!
//! All tunables live in [`LocalTrajectoryConfig`], deserializable from
//! any serde format with per-field defaults, so a partial document only
//! needs to name what it overrides.
//!
//! ## Sections
//!
//! | Section | Component |
//! |---------|-----------|
//! | top level | sensor ranges, accumulation, crop window, IMU gating |
//! | `adaptive_voxel_filter` | matcher-input downsampling |
//! | `correlative_matcher` | coarse search stage |
//! | `gauss_newton_matcher` | nonlinear refinement stage |
//! | `motion_filter` | insertion gating |
//! | `submaps` | grid resolution, rotation threshold |
//! | `pose_filter` | model variances |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{AdaptiveVoxelFilterConfig, MotionFilterConfig, PoseFilterConfig};
use crate::matching::{CorrelativeMatcherConfig, GaussNewtonMatcherConfig};
use crate::submap::SubmapConfig;

/// Configuration validation error.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// A field holds a value outside its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidValue(String),
}

/// Complete configuration of a [`LocalTrajectoryBuilder`](crate::trajectory::LocalTrajectoryBuilder).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalTrajectoryConfig {
    /// Whether IMU data is expected. When set, range and odometry data
    /// arriving before the first IMU sample are dropped; when clear, the
    /// orientation tracker starts on the first scan.
    ///
    /// Default: true
    #[serde(default = "default_true")]
    pub use_imu_data: bool,

    /// Gravity low-pass time constant for the orientation tracker (s).
    ///
    /// Default: 10.0
    #[serde(default = "default_imu_gravity_time_constant")]
    pub imu_gravity_time_constant: f32,

    /// Returns closer than this are discarded (meters).
    ///
    /// Default: 0.0
    #[serde(default)]
    pub min_range: f32,

    /// Returns farther than this become synthetic misses (meters).
    ///
    /// Default: 30.0
    #[serde(default = "default_max_range")]
    pub max_range: f32,

    /// Length of the synthetic miss ray for out-of-range returns (m).
    ///
    /// Default: 5.0
    #[serde(default = "default_missing_data_ray_length")]
    pub missing_data_ray_length: f32,

    /// Number of scans accumulated into one composite before matching.
    ///
    /// Default: 1
    #[serde(default = "default_scans_per_accumulation")]
    pub scans_per_accumulation: usize,

    /// Voxel edge for the fixed downsampling of the composite scan (m).
    ///
    /// Default: 0.025
    #[serde(default = "default_voxel_filter_size")]
    pub voxel_filter_size: f32,

    /// Lower z crop bound in the gravity-aligned frame (meters).
    ///
    /// Default: -0.8
    #[serde(default = "default_min_z")]
    pub min_z: f32,

    /// Upper z crop bound in the gravity-aligned frame (meters).
    ///
    /// Default: 2.0
    #[serde(default = "default_max_z")]
    pub max_z: f32,

    /// Capacity of the odometry state history.
    ///
    /// Default: 6
    #[serde(default = "default_num_odometry_states")]
    pub num_odometry_states: usize,

    /// Enable the correlative stage ahead of the nonlinear refinement.
    ///
    /// Default: false
    #[serde(default)]
    pub use_online_correlative_scan_matching: bool,

    /// Squared planar distance between odometer and estimate that
    /// engages odometer-priority mode (m²).
    ///
    /// Default: 5.0
    #[serde(default = "default_odometer_priority_distance_sq")]
    pub odometer_priority_distance_sq: f32,

    /// Number of accumulated scans odometer-priority mode stays engaged.
    ///
    /// Default: 300
    #[serde(default = "default_odometer_priority_scans")]
    pub odometer_priority_scans: u32,

    /// Target-count voxel sizing for matcher input.
    #[serde(default)]
    pub adaptive_voxel_filter: AdaptiveVoxelFilterConfig,

    /// Coarse correlative search stage.
    #[serde(default)]
    pub correlative_matcher: CorrelativeMatcherConfig,

    /// Nonlinear refinement stage.
    #[serde(default)]
    pub gauss_newton_matcher: GaussNewtonMatcherConfig,

    /// Insertion gating thresholds.
    #[serde(default)]
    pub motion_filter: MotionFilterConfig,

    /// Submap grid and rotation parameters.
    #[serde(default)]
    pub submaps: SubmapConfig,

    /// Pose filter model variances.
    #[serde(default)]
    pub pose_filter: PoseFilterConfig,
}

fn default_true() -> bool {
    true
}
fn default_imu_gravity_time_constant() -> f32 {
    10.0
}
fn default_max_range() -> f32 {
    30.0
}
fn default_missing_data_ray_length() -> f32 {
    5.0
}
fn default_scans_per_accumulation() -> usize {
    1
}
fn default_voxel_filter_size() -> f32 {
    0.025
}
fn default_min_z() -> f32 {
    -0.8
}
fn default_max_z() -> f32 {
    2.0
}
fn default_num_odometry_states() -> usize {
    6
}
fn default_odometer_priority_distance_sq() -> f32 {
    5.0
}
fn default_odometer_priority_scans() -> u32 {
    300
}

impl Default for LocalTrajectoryConfig {
    fn default() -> Self {
        Self {
            use_imu_data: true,
            imu_gravity_time_constant: default_imu_gravity_time_constant(),
            min_range: 0.0,
            max_range: default_max_range(),
            missing_data_ray_length: default_missing_data_ray_length(),
            scans_per_accumulation: default_scans_per_accumulation(),
            voxel_filter_size: default_voxel_filter_size(),
            min_z: default_min_z(),
            max_z: default_max_z(),
            num_odometry_states: default_num_odometry_states(),
            use_online_correlative_scan_matching: false,
            odometer_priority_distance_sq: default_odometer_priority_distance_sq(),
            odometer_priority_scans: default_odometer_priority_scans(),
            adaptive_voxel_filter: AdaptiveVoxelFilterConfig::default(),
            correlative_matcher: CorrelativeMatcherConfig::default(),
            gauss_newton_matcher: GaussNewtonMatcherConfig::default(),
            motion_filter: MotionFilterConfig::default(),
            submaps: SubmapConfig::default(),
            pose_filter: PoseFilterConfig::default(),
        }
    }
}

impl LocalTrajectoryConfig {
    /// Check value domains.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scans_per_accumulation == 0 {
            return Err(ConfigError::InvalidValue(
                "scans_per_accumulation must be >= 1".to_string(),
            ));
        }
        if self.min_range < 0.0 || self.max_range <= self.min_range {
            return Err(ConfigError::InvalidValue(format!(
                "range band [{}, {}] is empty or negative",
                self.min_range, self.max_range
            )));
        }
        if self.max_z <= self.min_z {
            return Err(ConfigError::InvalidValue(format!(
                "z crop window [{}, {}] is empty",
                self.min_z, self.max_z
            )));
        }
        if self.missing_data_ray_length <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "missing_data_ray_length must be positive".to_string(),
            ));
        }
        if self.num_odometry_states == 0 {
            return Err(ConfigError::InvalidValue(
                "num_odometry_states must be >= 1".to_string(),
            ));
        }
        if self.submaps.resolution <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "submaps.resolution must be positive".to_string(),
            ));
        }
        if self.submaps.num_range_data == 0 {
            return Err(ConfigError::InvalidValue(
                "submaps.num_range_data must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
