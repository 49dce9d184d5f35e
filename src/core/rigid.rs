//! Rigid transforms in 2D and 3D.
//!
//! The tracking pipeline works in two frames: full 3D poses (`Rigid3`,
//! unit quaternion + translation) for dead reckoning and IMU fusion, and
//! planar poses (`Pose2D`) for everything that touches the occupancy
//! grid. `project_2d` / `embed_3d` move between the two by dropping z and
//! keeping yaw.
//!
//! Coordinate convention follows ROS REP-103:
//! - X: forward, Y: left, Z: up
//! - Theta/yaw: CCW positive from +X axis, radians

use nalgebra::{Point2, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Planar rigid transform (x, y, theta).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Pose2D {
    /// X translation in meters.
    pub x: f32,
    /// Y translation in meters.
    pub y: f32,
    /// Rotation in radians (CCW positive from +X).
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose.
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self { x, y, theta }
    }

    /// The identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Transform a point from the local frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, point: Point2<f32>) -> Point2<f32> {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Point2::new(
            self.x + point.x * cos_t - point.y * sin_t,
            self.y + point.x * sin_t + point.y * cos_t,
        )
    }

    /// Compose two transforms: `self * other`.
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let p = self.transform_point(Point2::new(other.x, other.y));
        Pose2D::new(p.x, p.y, normalize_angle(self.theta + other.theta))
    }

    /// The inverse transform.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Planar distance to another pose.
    #[inline]
    pub fn distance(&self, other: &Pose2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl PartialEq for Pose2D {
    fn eq(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < 1e-6
            && (self.y - other.y).abs() < 1e-6
            && normalize_angle(self.theta - other.theta).abs() < 1e-6
    }
}

/// 3D rigid transform: unit-quaternion rotation plus translation.
#[derive(Clone, Copy, Debug)]
pub struct Rigid3 {
    /// Rotation component.
    pub rotation: UnitQuaternion<f32>,
    /// Translation component in meters.
    pub translation: Vector3<f32>,
}

impl Rigid3 {
    /// Create a transform from translation and rotation.
    #[inline]
    pub fn new(translation: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// A pure rotation (zero translation).
    #[inline]
    pub fn from_rotation(rotation: UnitQuaternion<f32>) -> Self {
        Self {
            rotation,
            translation: Vector3::zeros(),
        }
    }

    /// A pure translation (identity rotation).
    #[inline]
    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Compose two transforms: `self * other`.
    #[inline]
    pub fn compose(&self, other: &Rigid3) -> Rigid3 {
        Rigid3 {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    /// The inverse transform.
    #[inline]
    pub fn inverse(&self) -> Rigid3 {
        let rotation = self.rotation.inverse();
        Rigid3 {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Transform a point into the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.rotation * point + self.translation
    }

    /// Yaw of the rotation: the heading of the rotated unit-x axis.
    ///
    /// Well defined for any orientation, unlike Euler decomposition at
    /// gimbal configurations.
    #[inline]
    pub fn yaw(&self) -> f32 {
        yaw_of(&self.rotation)
    }

    /// Project to a planar pose, dropping z and keeping yaw.
    #[inline]
    pub fn project_2d(&self) -> Pose2D {
        Pose2D::new(self.translation.x, self.translation.y, self.yaw())
    }

    /// Embed a planar pose as a 3D transform (z = 0, roll = pitch = 0).
    #[inline]
    pub fn embed_3d(pose: &Pose2D) -> Rigid3 {
        Rigid3 {
            rotation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), pose.theta),
            translation: Vector3::new(pose.x, pose.y, 0.0),
        }
    }
}

impl Default for Rigid3 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Yaw of a rotation: heading of the rotated unit-x axis.
#[inline]
pub fn yaw_of(rotation: &UnitQuaternion<f32>) -> f32 {
    let direction = rotation * Vector3::x();
    direction.y.atan2(direction.x)
}

/// Normalize an angle to [-pi, pi].
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle;
    while a > std::f32::consts::PI {
        a -= 2.0 * std::f32::consts::PI;
    }
    while a < -std::f32::consts::PI {
        a += 2.0 * std::f32::consts::PI;
    }
    a
}
