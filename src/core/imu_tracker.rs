//! Gravity-aligned orientation tracking from inertial data.
//!
//! The [`OrientationTracker`] keeps a world-aligned orientation by
//! integrating angular velocity between observations and slowly steering
//! the result toward the gravity direction seen by the accelerometer.
//!
//! # Algorithm
//!
//! 1. **Gyro integration**: `advance(t)` rotates the orientation by the
//!    stored angular velocity times the elapsed interval.
//! 2. **Gravity estimation**: linear-acceleration observations feed an
//!    exponential filter, `alpha = 1 - exp(-dt / time_constant)`. The
//!    time constant trades noise rejection against responsiveness.
//! 3. **Alignment**: after each gravity update, the orientation is
//!    corrected by the rotation that maps the filtered gravity estimate
//!    onto the body-frame up axis, so roll and pitch stay anchored to
//!    gravity while yaw evolves purely from the gyro.
//!
//! Yaw therefore drifts with gyro bias; the scan matcher corrects
//! absolute yaw downstream.

use nalgebra::{UnitQuaternion, Vector3};

/// Standard gravity in m/s².
const G: f32 = 9.81;

/// World-aligned orientation from gyro integration plus gravity steering.
#[derive(Clone, Debug)]
pub struct OrientationTracker {
    /// Exponential time constant for the gravity filter (seconds).
    gravity_time_constant: f32,

    /// Time of the last `advance` (microseconds).
    timestamp_us: u64,

    /// Time of the last linear-acceleration observation.
    last_acceleration_time_us: Option<u64>,

    /// Current orientation estimate.
    orientation: UnitQuaternion<f32>,

    /// Filtered gravity direction in the body frame (m/s²).
    gravity_vector: Vector3<f32>,

    /// Most recent angular velocity observation (rad/s, body frame).
    angular_velocity: Vector3<f32>,
}

impl OrientationTracker {
    /// Create a tracker at `timestamp_us` with identity orientation.
    pub fn new(gravity_time_constant: f32, timestamp_us: u64) -> Self {
        Self {
            gravity_time_constant,
            timestamp_us,
            last_acceleration_time_us: None,
            orientation: UnitQuaternion::identity(),
            gravity_vector: Vector3::new(0.0, 0.0, G),
            angular_velocity: Vector3::zeros(),
        }
    }

    /// Integrate the stored angular velocity up to `timestamp_us`.
    ///
    /// # Panics
    ///
    /// Panics when `timestamp_us` precedes the tracker time; callers must
    /// feed monotonically non-decreasing times.
    pub fn advance(&mut self, timestamp_us: u64) {
        assert!(
            timestamp_us >= self.timestamp_us,
            "orientation tracker time went backwards: {} < {}",
            timestamp_us,
            self.timestamp_us
        );
        let dt = (timestamp_us - self.timestamp_us) as f32 / 1_000_000.0;

        let rotation = UnitQuaternion::from_scaled_axis(self.angular_velocity * dt);
        self.orientation *= rotation;
        // The body frame rotated, so the gravity estimate counter-rotates.
        self.gravity_vector = rotation.inverse() * self.gravity_vector;
        self.timestamp_us = timestamp_us;
    }

    /// Record an angular velocity observation (rad/s, body frame).
    pub fn add_angular_velocity(&mut self, timestamp_us: u64, angular_velocity: Vector3<f32>) {
        debug_assert!(timestamp_us >= self.timestamp_us);
        self.angular_velocity = angular_velocity;
    }

    /// Record a linear acceleration observation (m/s², body frame).
    ///
    /// When `absolute_orientation` is provided, the gravity observation is
    /// taken from it (the world up axis rotated into the body frame)
    /// instead of the raw accelerometer, which removes the motion
    /// component from the measurement.
    pub fn add_linear_acceleration(
        &mut self,
        timestamp_us: u64,
        linear_acceleration: Vector3<f32>,
        absolute_orientation: Option<&UnitQuaternion<f32>>,
    ) {
        let dt = match self.last_acceleration_time_us {
            Some(last) => (timestamp_us.saturating_sub(last)) as f32 / 1_000_000.0,
            None => f32::INFINITY,
        };
        self.last_acceleration_time_us = Some(timestamp_us);

        let observed = match absolute_orientation {
            Some(q) => q.inverse() * Vector3::new(0.0, 0.0, G),
            None => linear_acceleration,
        };

        let alpha = 1.0 - (-dt / self.gravity_time_constant).exp();
        self.gravity_vector = (1.0 - alpha) * self.gravity_vector + alpha * observed;

        // Steer the orientation so the filtered gravity maps onto the
        // world up axis expressed in the body frame.
        let target = self.orientation.inverse() * Vector3::z();
        if let Some(correction) = UnitQuaternion::rotation_between(&self.gravity_vector, &target) {
            self.orientation *= correction;
        }
    }

    /// Current orientation estimate.
    #[inline]
    pub fn orientation(&self) -> UnitQuaternion<f32> {
        self.orientation
    }

    /// Current filtered gravity vector in the body frame.
    #[inline]
    pub fn gravity_vector(&self) -> Vector3<f32> {
        self.gravity_vector
    }

    /// Time of the last `advance`.
    #[inline]
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }
}
