//! Kalman-style 6-DoF pose filtering.
//!
//! The [`PoseFilter`] maintains a full 3D pose with a 6×6 covariance over
//! [translation, rotation] and a velocity estimate. It fuses inertial
//! observations (through an internal [`OrientationTracker`]) with
//! external pose observations such as gravity-corrected wheel odometry.
//!
//! The prediction model matches the rest of the pipeline: constant
//! velocity for translation, gyro-integrated yaw delta on top of the
//! gravity-aligned roll/pitch for rotation. Process noise is injected
//! per-axis from the configured model variances.
//!
//! The filter clamps to monotonically non-decreasing time: predicting to
//! a past time is a no-op rather than an error, so high-rate observation
//! streams with slight reordering do not tear the estimate.

use nalgebra::{Matrix6, UnitQuaternion, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use super::imu_tracker::OrientationTracker;
use super::rigid::{yaw_of, Rigid3};

/// 6×6 covariance over [translation, rotation].
pub type PoseCovariance = Matrix6<f32>;

/// Model variances for the pose filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoseFilterConfig {
    /// Rotation process noise (rad²/s).
    ///
    /// Default: 5e-3
    #[serde(default = "default_orientation_model_variance")]
    pub orientation_model_variance: f32,

    /// Translation process noise (m²/s).
    ///
    /// Default: 6.5e-3
    #[serde(default = "default_position_model_variance")]
    pub position_model_variance: f32,

    /// Velocity process noise (m²/s³), feeds translation uncertainty
    /// quadratically in the prediction interval.
    ///
    /// Default: 0.54
    #[serde(default = "default_velocity_model_variance")]
    pub velocity_model_variance: f32,

    /// Gravity time constant for the internal orientation tracker (s).
    ///
    /// Default: 10.0
    #[serde(default = "default_gravity_time_constant")]
    pub imu_gravity_time_constant: f32,
}

fn default_orientation_model_variance() -> f32 {
    5e-3
}
fn default_position_model_variance() -> f32 {
    6.5e-3
}
fn default_velocity_model_variance() -> f32 {
    0.54
}
fn default_gravity_time_constant() -> f32 {
    10.0
}

impl Default for PoseFilterConfig {
    fn default() -> Self {
        Self {
            orientation_model_variance: default_orientation_model_variance(),
            position_model_variance: default_position_model_variance(),
            velocity_model_variance: default_velocity_model_variance(),
            imu_gravity_time_constant: default_gravity_time_constant(),
        }
    }
}

/// Filtered 6-DoF pose with covariance, fused from IMU and pose
/// observations.
#[derive(Clone, Debug)]
pub struct PoseFilter {
    config: PoseFilterConfig,

    /// Filter time (microseconds).
    timestamp_us: u64,

    /// Mean pose estimate.
    pose: Rigid3,

    /// Velocity estimate in the world frame (m/s).
    velocity: Vector3<f32>,

    /// Covariance over [translation, rotation].
    covariance: PoseCovariance,

    /// Orientation propagation between pose observations.
    orientation_tracker: OrientationTracker,

    /// Last pose observation, for velocity estimation.
    last_pose_observation: Option<(u64, Vector3<f32>)>,
}

impl PoseFilter {
    /// Create a filter at `timestamp_us` with an identity pose.
    pub fn new(config: PoseFilterConfig, timestamp_us: u64) -> Self {
        let orientation_tracker =
            OrientationTracker::new(config.imu_gravity_time_constant, timestamp_us);
        Self {
            config,
            timestamp_us,
            pose: Rigid3::identity(),
            velocity: Vector3::zeros(),
            covariance: PoseCovariance::identity() * 1e-6,
            orientation_tracker,
            last_pose_observation: None,
        }
    }

    /// Extrapolate the estimate to `timestamp_us`.
    ///
    /// Past times are clamped: the filter never runs backwards.
    pub fn predict(&mut self, timestamp_us: u64) {
        if timestamp_us <= self.timestamp_us {
            return;
        }
        let dt = (timestamp_us - self.timestamp_us) as f32 / 1_000_000.0;

        let last_yaw = yaw_of(&self.orientation_tracker.orientation());
        self.orientation_tracker.advance(timestamp_us);

        let translation = self.pose.translation + self.velocity * dt;
        // Keep the estimate's yaw, apply the gyro yaw delta, take
        // roll/pitch from the gravity-aligned tracker.
        let rotation = UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            self.pose.yaw() - last_yaw,
        ) * self.orientation_tracker.orientation();
        self.pose = Rigid3::new(translation, rotation);

        let q_translation = (self.config.position_model_variance
            + self.config.velocity_model_variance * dt)
            * dt;
        let q_rotation = self.config.orientation_model_variance * dt;
        for i in 0..3 {
            self.covariance[(i, i)] += q_translation;
            self.covariance[(i + 3, i + 3)] += q_rotation;
        }

        self.timestamp_us = timestamp_us;
    }

    /// Fuse an external pose observation with measurement covariance.
    pub fn add_pose_observation(
        &mut self,
        timestamp_us: u64,
        pose: &Rigid3,
        covariance: &PoseCovariance,
    ) {
        let timestamp_us = timestamp_us.max(self.timestamp_us);
        self.predict(timestamp_us);

        let translation_error = pose.translation - self.pose.translation;
        let rotation_error = (self.pose.rotation.inverse() * pose.rotation).scaled_axis();
        let mut error = Vector6::zeros();
        error.fixed_rows_mut::<3>(0).copy_from(&translation_error);
        error.fixed_rows_mut::<3>(3).copy_from(&rotation_error);

        let innovation = self.covariance + covariance;
        let Some(innovation_inv) = innovation.try_inverse() else {
            log::warn!("pose observation skipped: singular innovation covariance");
            return;
        };
        let gain = self.covariance * innovation_inv;
        let correction = gain * error;

        self.pose = Rigid3::new(
            self.pose.translation + correction.fixed_rows::<3>(0).into_owned(),
            self.pose.rotation
                * UnitQuaternion::from_scaled_axis(correction.fixed_rows::<3>(3).into_owned()),
        );
        self.covariance = (PoseCovariance::identity() - gain) * self.covariance;

        if let Some((last_time, last_translation)) = self.last_pose_observation {
            let dt = (timestamp_us.saturating_sub(last_time)) as f32 / 1_000_000.0;
            if dt > 1e-3 {
                self.velocity = (pose.translation - last_translation) / dt;
            }
        }
        self.last_pose_observation = Some((timestamp_us, pose.translation));
    }

    /// Feed a linear acceleration observation to the orientation model.
    pub fn add_linear_acceleration_observation(
        &mut self,
        timestamp_us: u64,
        linear_acceleration: Vector3<f32>,
        absolute_orientation: Option<&UnitQuaternion<f32>>,
    ) {
        let timestamp_us = timestamp_us.max(self.timestamp_us);
        self.predict(timestamp_us);
        self.orientation_tracker.add_linear_acceleration(
            timestamp_us,
            linear_acceleration,
            absolute_orientation,
        );
    }

    /// Feed an angular velocity observation to the orientation model.
    pub fn add_angular_velocity_observation(
        &mut self,
        timestamp_us: u64,
        angular_velocity: Vector3<f32>,
    ) {
        let timestamp_us = timestamp_us.max(self.timestamp_us);
        self.predict(timestamp_us);
        self.orientation_tracker
            .add_angular_velocity(timestamp_us, angular_velocity);
    }

    /// Predict to `timestamp_us` and read mean and covariance.
    pub fn mean_and_covariance(&mut self, timestamp_us: u64) -> (Rigid3, PoseCovariance) {
        self.predict(timestamp_us);
        (self.pose, self.covariance)
    }

    /// Current velocity estimate (world frame, m/s).
    #[inline]
    pub fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_identity() {
        let mut filter = PoseFilter::new(PoseFilterConfig::default(), 0);
        let (pose, cov) = filter.mean_and_covariance(0);

        assert!(pose.translation.norm() < 1e-6);
        assert!(pose.rotation.angle() < 1e-6);
        assert!(cov[(0, 0)] < 1e-3);
    }

    #[test]
    fn test_predict_grows_covariance() {
        let mut filter = PoseFilter::new(PoseFilterConfig::default(), 0);
        let (_, before) = filter.mean_and_covariance(0);

        filter.predict(2_000_000);
        let (_, after) = filter.mean_and_covariance(2_000_000);

        assert!(after[(0, 0)] > before[(0, 0)]);
        assert!(after[(3, 3)] > before[(3, 3)]);
    }

    #[test]
    fn test_predict_clamps_to_past_time() {
        let mut filter = PoseFilter::new(PoseFilterConfig::default(), 1_000_000);
        filter.predict(2_000_000);
        let (pose_before, cov_before) = filter.mean_and_covariance(2_000_000);

        // Going backwards must change nothing.
        filter.predict(500_000);
        let (pose_after, cov_after) = filter.mean_and_covariance(500_000);

        assert!((pose_before.translation - pose_after.translation).norm() < 1e-6);
        assert!((cov_before[(0, 0)] - cov_after[(0, 0)]).abs() < 1e-9);
    }

    #[test]
    fn test_pose_observation_pulls_mean() {
        let mut filter = PoseFilter::new(PoseFilterConfig::default(), 0);
        filter.predict(1_000_000);

        let observed = Rigid3::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let tight = PoseCovariance::identity() * 1e-6;
        filter.add_pose_observation(1_000_000, &observed, &tight);

        let (pose, _) = filter.mean_and_covariance(1_000_000);
        assert!(
            (pose.translation.x - 1.0).abs() < 0.1,
            "x = {}",
            pose.translation.x
        );
    }

    #[test]
    fn test_observation_shrinks_covariance() {
        let mut filter = PoseFilter::new(PoseFilterConfig::default(), 0);
        filter.predict(5_000_000);
        let (_, inflated) = filter.mean_and_covariance(5_000_000);

        let tight = PoseCovariance::identity() * 1e-6;
        filter.add_pose_observation(5_000_000, &Rigid3::identity(), &tight);
        let (_, updated) = filter.mean_and_covariance(5_000_000);

        assert!(updated[(0, 0)] < inflated[(0, 0)]);
    }

    #[test]
    fn test_velocity_from_consecutive_observations() {
        let mut filter = PoseFilter::new(PoseFilterConfig::default(), 0);
        let tight = PoseCovariance::identity() * 1e-6;

        // 1 m/s along x, observed every 100 ms.
        for i in 1..=10u64 {
            let pose = Rigid3::from_translation(Vector3::new(i as f32 * 0.1, 0.0, 0.0));
            filter.add_pose_observation(i * 100_000, &pose, &tight);
        }

        let v = filter.velocity();
        assert!((v.x - 1.0).abs() < 0.2, "vx = {}", v.x);
        assert!(v.y.abs() < 0.1, "vy = {}", v.y);
    }
}
