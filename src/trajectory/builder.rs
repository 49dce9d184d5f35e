//! The local trajectory builder.
//!
//! Wires dead reckoning, scan matching and submap management into the
//! online front-end loop:
//!
//! ```text
//! IMU ──────────► OrientationTracker ─┐
//!   └───────────► PoseFilter          │
//! odometry ─────► PoseFilter ─► odometry correction
//! range data ──► predict ─► accumulate ─► gravity-align ─► crop/filter
//!                       └► scan match ─► fused pose ─► motion gate ─► submaps
//! ```
//!
//! The builder is single-threaded and synchronous: every ingestion call
//! completes all work before returning, owns its components exclusively,
//! and hands results out by value. Inbound samples must be non-decreasing
//! in time; a violating sample is a programming error and aborts.

use std::sync::Arc;

use nalgebra::{Point3, UnitQuaternion, Vector2, Vector3};

use crate::config::LocalTrajectoryConfig;
use crate::core::{
    AdaptiveVoxelFilter, MotionFilter, OdometryState, OdometryStateTracker, OrientationTracker,
    PoseCovariance, PoseFilter, RangeData, Rigid3, voxel_filtered, yaw_of,
};
use crate::matching::{CorrelativeMatcher, GaussNewtonMatcher};
use crate::submap::{ActiveSubmaps, Submap};

use super::accumulator::RangeAccumulator;
use super::{InsertionResult, PoseEstimate};

/// Online front end fusing IMU, odometry and range data into a local
/// trajectory and a pair of growing submaps.
pub struct LocalTrajectoryBuilder {
    config: LocalTrajectoryConfig,

    active_submaps: ActiveSubmaps,
    motion_filter: MotionFilter,
    correlative_matcher: CorrelativeMatcher,
    gauss_newton_matcher: GaussNewtonMatcher,
    adaptive_voxel_filter: AdaptiveVoxelFilter,
    accumulator: RangeAccumulator,
    odometry_state_tracker: OdometryStateTracker,

    /// Set on the first IMU sample (or first scan when IMU is disabled).
    orientation_tracker: Option<OrientationTracker>,
    /// Lazily constructed on the first IMU sample.
    pose_filter: Option<PoseFilter>,

    /// Time cursor: all state below is valid at this time.
    timestamp_us: Option<u64>,
    /// Latest scan-matched (or extrapolated) pose.
    pose_estimate: Rigid3,
    /// Velocity estimate in the xy plane (m/s).
    velocity_estimate: Vector2<f32>,
    /// Right-multiplicative residual between the model prediction and
    /// the wheel-odometer prediction.
    odometry_correction: Rigid3,

    last_scan_match_time_us: Option<u64>,
    last_pose_estimate: Option<PoseEstimate>,

    /// True while the odometer jump guard trusts wheels over the model.
    odometer_priority: bool,
    /// Accumulated-scan countdown of the guard.
    odometer_priority_countdown: u32,
}

impl LocalTrajectoryBuilder {
    /// Create a builder from a validated configuration.
    ///
    /// # Panics
    ///
    /// Panics when the configuration fails validation; a bad
    /// configuration is a programming error, not a runtime condition.
    pub fn new(config: LocalTrajectoryConfig) -> Self {
        if let Err(error) = config.validate() {
            panic!("local trajectory configuration rejected: {error}");
        }

        Self {
            active_submaps: ActiveSubmaps::new(config.submaps.clone()),
            motion_filter: MotionFilter::new(config.motion_filter.clone()),
            correlative_matcher: CorrelativeMatcher::new(config.correlative_matcher.clone()),
            gauss_newton_matcher: GaussNewtonMatcher::new(config.gauss_newton_matcher.clone()),
            adaptive_voxel_filter: AdaptiveVoxelFilter::new(config.adaptive_voxel_filter.clone()),
            accumulator: RangeAccumulator::new(
                config.scans_per_accumulation,
                config.min_range,
                config.max_range,
                config.missing_data_ray_length,
            ),
            odometry_state_tracker: OdometryStateTracker::new(config.num_odometry_states),
            orientation_tracker: None,
            pose_filter: None,
            timestamp_us: None,
            pose_estimate: Rigid3::identity(),
            velocity_estimate: Vector2::zeros(),
            odometry_correction: Rigid3::identity(),
            last_scan_match_time_us: None,
            last_pose_estimate: None,
            odometer_priority: false,
            odometer_priority_countdown: 0,
            config,
        }
    }

    /// Ingest an IMU sample.
    ///
    /// # Panics
    ///
    /// Panics when `use_imu_data` is false (an unexpected IMU packet is
    /// a wiring error) or when time runs backwards.
    pub fn add_imu(
        &mut self,
        timestamp_us: u64,
        linear_acceleration: Vector3<f32>,
        angular_velocity: Vector3<f32>,
        absolute_orientation: UnitQuaternion<f32>,
    ) {
        assert!(
            self.config.use_imu_data,
            "unexpected IMU data: use_imu_data is disabled"
        );

        if self.pose_filter.is_none() {
            self.pose_filter = Some(PoseFilter::new(
                self.config.pose_filter.clone(),
                timestamp_us,
            ));
        }
        self.initialize_orientation_tracker(timestamp_us);
        self.predict(timestamp_us);

        let tracker = self
            .orientation_tracker
            .as_mut()
            .expect("orientation tracker initialized above");
        tracker.add_linear_acceleration(
            timestamp_us,
            linear_acceleration,
            Some(&absolute_orientation),
        );
        tracker.add_angular_velocity(timestamp_us, angular_velocity);

        let filter = self
            .pose_filter
            .as_mut()
            .expect("pose filter initialized above");
        filter.add_linear_acceleration_observation(
            timestamp_us,
            linear_acceleration,
            Some(&absolute_orientation),
        );
        filter.add_angular_velocity_observation(timestamp_us, angular_velocity);
    }

    /// Ingest a wheel-odometry pose.
    ///
    /// Dropped (with a log line) until the orientation tracker and pose
    /// filter are initialized by IMU data.
    pub fn add_odometer(&mut self, timestamp_us: u64, odometer_pose: &Rigid3) {
        if self.orientation_tracker.is_none() {
            log::info!("orientation tracker not yet initialized; dropping odometry data");
            return;
        }
        if self.pose_filter.is_none() {
            log::info!("pose filter not yet initialized; dropping odometry data");
            return;
        }

        self.predict(timestamp_us);

        // The wheel orientation is replaced by the gravity-aligned one.
        let imu_orientation = self
            .orientation_tracker
            .as_ref()
            .expect("checked above")
            .orientation();
        let odometer_pose_with_imu = Rigid3::new(odometer_pose.translation, imu_orientation);

        let filter = self.pose_filter.as_mut().expect("checked above");
        filter.add_pose_observation(
            timestamp_us,
            &odometer_pose_with_imu,
            &(PoseCovariance::identity() * 1e-6),
        );
        let (filtered_pose, _) = filter.mean_and_covariance(timestamp_us);
        log::debug!(
            "odometer at ({:.3}, {:.3}), filtered ({:.3}, {:.3})",
            odometer_pose_with_imu.translation.x,
            odometer_pose_with_imu.translation.y,
            filtered_pose.translation.x,
            filtered_pose.translation.y
        );

        if !self.odometry_state_tracker.is_empty() {
            let previous = self.odometry_state_tracker.newest();
            let (previous_odometer_pose, previous_state_pose) =
                (previous.odometer_pose, previous.state_pose);

            let delta = previous_odometer_pose
                .inverse()
                .compose(&odometer_pose_with_imu);
            let new_pose = previous_state_pose.compose(&delta);

            let dx = odometer_pose.translation.x - self.pose_estimate.translation.x;
            let dy = odometer_pose.translation.y - self.pose_estimate.translation.y;
            let distance_sq = dx * dx + dy * dy;
            if distance_sq > self.config.odometer_priority_distance_sq {
                if !self.odometer_priority {
                    log::warn!(
                        "odometer {:.2} m² away from the estimate; engaging odometer-priority mode",
                        distance_sq
                    );
                }
                self.odometer_priority = true;
                self.odometer_priority_countdown = self.config.odometer_priority_scans;
            }

            if self.odometer_priority_countdown > 1 {
                // Trust the wheels directly until the countdown runs out.
                self.odometry_correction = self
                    .pose_estimate
                    .inverse()
                    .compose(&odometer_pose_with_imu);
                self.odometer_priority_countdown -= 1;
            } else {
                if self.odometer_priority {
                    log::info!("odometer-priority mode disengaged");
                }
                self.odometer_priority = false;
                self.odometry_correction = self.pose_estimate.inverse().compose(&new_pose);
            }
        }

        self.odometry_state_tracker.add_state(OdometryState {
            timestamp_us,
            odometer_pose: odometer_pose_with_imu,
            state_pose: self.pose_estimate.compose(&self.odometry_correction),
        });
    }

    /// Ingest one horizontal range scan.
    ///
    /// Returns an [`InsertionResult`] when the scan completed an
    /// accumulation batch, matched, and passed the motion filter.
    pub fn add_horizontal_range(
        &mut self,
        timestamp_us: u64,
        range_data: &RangeData,
    ) -> Option<InsertionResult> {
        if !self.config.use_imu_data {
            // No IMU will ever arrive; bootstrap the tracker here.
            self.initialize_orientation_tracker(timestamp_us);
        }
        if self.orientation_tracker.is_none() {
            log::info!("orientation tracker not yet initialized; dropping range data");
            return None;
        }

        self.predict(timestamp_us);

        let composite = self.accumulator.add_scan(range_data, &self.pose_estimate)?;
        self.add_accumulated_range_data(timestamp_us, composite)
    }

    /// The last scan-match result, if any scan has been processed.
    #[inline]
    pub fn pose_estimate(&self) -> Option<&PoseEstimate> {
        self.last_pose_estimate.as_ref()
    }

    /// The builder's time cursor.
    #[inline]
    pub fn time(&self) -> Option<u64> {
        self.timestamp_us
    }

    /// Current xy velocity estimate (m/s).
    #[inline]
    pub fn velocity_estimate(&self) -> Vector2<f32> {
        self.velocity_estimate
    }

    /// Current odometry correction residual.
    #[inline]
    pub fn odometry_correction(&self) -> &Rigid3 {
        &self.odometry_correction
    }

    /// True while the odometer jump guard is engaged.
    #[inline]
    pub fn odometer_priority_active(&self) -> bool {
        self.odometer_priority
    }

    /// The active submaps (index 0 is the matching target).
    #[inline]
    pub fn submaps(&self) -> &[Arc<Submap>] {
        self.active_submaps.submaps()
    }

    fn initialize_orientation_tracker(&mut self, timestamp_us: u64) {
        if self.orientation_tracker.is_none() {
            self.orientation_tracker = Some(OrientationTracker::new(
                self.config.imu_gravity_time_constant,
                timestamp_us,
            ));
        }
    }

    /// Advance the fused state to `timestamp_us`.
    ///
    /// Constant-velocity translation; rotation keeps the estimate's yaw
    /// plus the IMU yaw delta, with roll/pitch from gravity alignment.
    fn predict(&mut self, timestamp_us: u64) {
        if let Some(cursor) = self.timestamp_us {
            assert!(
                timestamp_us >= cursor,
                "time cursor went backwards: {} < {}",
                timestamp_us,
                cursor
            );
        }

        let tracker = self
            .orientation_tracker
            .as_mut()
            .expect("predict requires an initialized orientation tracker");
        let last_yaw = yaw_of(&tracker.orientation());
        tracker.advance(timestamp_us);

        if let Some(cursor) = self.timestamp_us {
            let dt = (timestamp_us - cursor) as f32 / 1_000_000.0;
            let translation = self.pose_estimate.translation
                + dt * Vector3::new(self.velocity_estimate.x, self.velocity_estimate.y, 0.0);
            let rotation = UnitQuaternion::from_axis_angle(
                &Vector3::z_axis(),
                self.pose_estimate.yaw() - last_yaw,
            ) * tracker.orientation();
            self.pose_estimate = Rigid3::new(translation, rotation);
        }
        self.timestamp_us = Some(timestamp_us);
    }

    /// Match a composite scan and, if motion-gated through, insert it.
    fn add_accumulated_range_data(
        &mut self,
        timestamp_us: u64,
        range_data: RangeData,
    ) -> Option<InsertionResult> {
        let odometry_prediction = self.pose_estimate.compose(&self.odometry_correction);
        let model_prediction = self.pose_estimate;
        let pose_prediction = odometry_prediction;

        // The rotation that zeroes yaw, leaving roll and pitch: scans
        // projected through it land in a gravity-aligned horizontal
        // frame.
        let tracking_to_tracking_2d = Rigid3::from_rotation(
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -pose_prediction.yaw())
                * pose_prediction.rotation,
        );

        let range_data_in_tracking_2d = {
            let cropped = range_data
                .transform(&tracking_to_tracking_2d)
                .crop_z(self.config.min_z, self.config.max_z);
            RangeData {
                origin: cropped.origin,
                returns: voxel_filtered(&cropped.returns, self.config.voxel_filter_size),
                misses: voxel_filtered(&cropped.misses, self.config.voxel_filter_size),
            }
        };

        if range_data_in_tracking_2d.returns.is_empty() {
            log::warn!("dropped empty horizontal range data");
            return None;
        }

        self.pose_estimate = self.scan_match(
            &pose_prediction,
            &tracking_to_tracking_2d,
            &range_data_in_tracking_2d,
        );
        self.odometry_correction = Rigid3::identity();

        if !self.odometry_state_tracker.is_empty() && !self.odometer_priority {
            // Append a synthetic odometry state so the next odometry
            // delta does not erase the scan-match correction.
            let newest = self.odometry_state_tracker.newest();
            let (newest_odometer_pose, newest_state_pose) =
                (newest.odometer_pose, newest.state_pose);
            self.odometry_state_tracker.add_state(OdometryState {
                timestamp_us,
                odometer_pose: newest_odometer_pose,
                state_pose: newest_state_pose
                    .compose(&odometry_prediction.inverse())
                    .compose(&self.pose_estimate),
            });
        }

        // Fold the observed prediction error into the velocity estimate,
        // suppressed while the odometer guard overrides the model.
        if let Some(last_match_time) = self.last_scan_match_time_us {
            if timestamp_us > last_match_time && !self.odometer_priority {
                let dt = (timestamp_us - last_match_time) as f32 / 1_000_000.0;
                let error = self.pose_estimate.translation - model_prediction.translation;
                self.velocity_estimate += Vector2::new(error.x, error.y) / dt;
            }
        }
        self.last_scan_match_time_us = Some(timestamp_us);

        // Drop the unobservable vertical drift.
        self.pose_estimate = Rigid3::new(
            Vector3::new(
                self.pose_estimate.translation.x,
                self.pose_estimate.translation.y,
                0.0,
            ),
            self.pose_estimate.rotation,
        );

        let tracking_2d_to_map = self
            .pose_estimate
            .compose(&tracking_to_tracking_2d.inverse());
        self.last_pose_estimate = Some(PoseEstimate {
            timestamp_us,
            pose: self.pose_estimate,
            point_cloud: range_data_in_tracking_2d
                .returns
                .iter()
                .map(|p| tracking_2d_to_map.transform_point(p))
                .collect(),
        });

        let pose_estimate_2d = tracking_2d_to_map.project_2d();
        if self
            .motion_filter
            .is_similar(timestamp_us, &Rigid3::embed_3d(&pose_estimate_2d))
        {
            return None;
        }

        let insertion_submaps: Vec<Arc<Submap>> = self.active_submaps.insert_range_data(
            &range_data_in_tracking_2d.transform(&Rigid3::embed_3d(&pose_estimate_2d)),
        );

        Some(InsertionResult {
            timestamp_us,
            insertion_submaps,
            tracking_to_tracking_2d,
            range_data_in_tracking_2d,
            pose_estimate_2d,
        })
    }

    /// Two-stage scan match against the matching submap.
    fn scan_match(
        &self,
        pose_prediction: &Rigid3,
        tracking_to_tracking_2d: &Rigid3,
        range_data_in_tracking_2d: &RangeData,
    ) -> Rigid3 {
        let pose_prediction_2d = pose_prediction
            .compose(&tracking_to_tracking_2d.inverse())
            .project_2d();

        let filtered;
        let matcher_cloud: &[Point3<f32>] =
            if self.config.gauss_newton_matcher.use_filtered_returns {
                filtered = self
                    .adaptive_voxel_filter
                    .filter(&range_data_in_tracking_2d.returns);
                &filtered
            } else {
                &range_data_in_tracking_2d.returns
            };

        let grid = self.active_submaps.matching_submap().grid();

        let mut initial_estimate = pose_prediction_2d;
        if self.config.use_online_correlative_scan_matching {
            let (refined, score) =
                self.correlative_matcher
                    .match_scan(&pose_prediction_2d, matcher_cloud, grid);
            log::debug!("correlative stage score {:.3}", score);
            initial_estimate = refined;
        }

        let (pose_2d, summary) = self.gauss_newton_matcher.match_scan(
            &pose_prediction_2d,
            &initial_estimate,
            matcher_cloud,
            grid,
        );
        if !summary.converged {
            log::debug!(
                "scan match not converged after {} iterations (cost {:.4})",
                summary.iterations,
                summary.final_cost
            );
        }

        Rigid3::embed_3d(&pose_2d).compose(tracking_to_tracking_2d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn no_imu_config() -> LocalTrajectoryConfig {
        LocalTrajectoryConfig {
            use_imu_data: false,
            ..Default::default()
        }
    }

    fn single_point_scan() -> RangeData {
        RangeData::new(Point3::origin(), vec![Point3::new(1.0, 0.0, 0.0)])
    }

    #[test]
    fn test_range_before_imu_dropped() {
        let mut builder = LocalTrajectoryBuilder::new(LocalTrajectoryConfig::default());
        let result = builder.add_horizontal_range(0, &single_point_scan());
        assert!(result.is_none());
        assert!(builder.pose_estimate().is_none());
    }

    #[test]
    fn test_odometer_before_imu_dropped() {
        let mut builder = LocalTrajectoryBuilder::new(LocalTrajectoryConfig::default());
        builder.add_odometer(0, &Rigid3::identity());
        assert!(builder.time().is_none());
    }

    #[test]
    #[should_panic(expected = "unexpected IMU data")]
    fn test_imu_with_disabled_imu_panics() {
        let mut builder = LocalTrajectoryBuilder::new(no_imu_config());
        builder.add_imu(
            0,
            Vector3::new(0.0, 0.0, 9.81),
            Vector3::zeros(),
            UnitQuaternion::identity(),
        );
    }

    #[test]
    #[should_panic(expected = "time cursor went backwards")]
    fn test_time_regression_panics() {
        let mut builder = LocalTrajectoryBuilder::new(no_imu_config());
        builder.add_horizontal_range(1_000_000, &single_point_scan());
        builder.add_horizontal_range(500_000, &single_point_scan());
    }

    #[test]
    #[should_panic(expected = "configuration rejected")]
    fn test_invalid_config_panics() {
        let config = LocalTrajectoryConfig {
            scans_per_accumulation: 0,
            ..Default::default()
        };
        let _ = LocalTrajectoryBuilder::new(config);
    }

    #[test]
    fn test_first_scan_inserts_identity() {
        let mut builder = LocalTrajectoryBuilder::new(no_imu_config());
        let result = builder
            .add_horizontal_range(0, &single_point_scan())
            .expect("first scan inserts");

        assert_eq!(result.timestamp_us, 0);
        assert!(result.pose_estimate_2d.distance(&crate::core::Pose2D::identity()) < 1e-3);
        // The overlap submap has not been bootstrapped yet.
        assert_eq!(result.insertion_submaps.len(), 1);
        assert_eq!(result.range_data_in_tracking_2d.returns.len(), 1);
    }

    #[test]
    fn test_pose_estimate_z_is_zero() {
        let mut builder = LocalTrajectoryBuilder::new(no_imu_config());
        builder.add_horizontal_range(0, &single_point_scan());

        let estimate = builder.pose_estimate().expect("scan processed");
        assert_eq!(estimate.pose.translation.z, 0.0);
    }

    #[test]
    fn test_odometry_correction_identity_after_scan() {
        let mut builder = LocalTrajectoryBuilder::new(no_imu_config());
        builder.add_horizontal_range(0, &single_point_scan());

        let correction = builder.odometry_correction();
        assert!(correction.translation.norm() < 1e-6);
        assert!(correction.rotation.angle() < 1e-6);
    }
}
