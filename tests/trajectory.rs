//! End-to-end scenarios for the local trajectory builder.

use marga_slam::{
    LocalTrajectoryBuilder, LocalTrajectoryConfig, MotionFilterConfig, Pose2D, RangeData, Rigid3,
};
use nalgebra::{Point2, Point3, UnitQuaternion, Vector3};

const G: f32 = 9.81;

fn no_imu_config() -> LocalTrajectoryConfig {
    LocalTrajectoryConfig {
        use_imu_data: false,
        ..Default::default()
    }
}

fn single_point_scan() -> RangeData {
    RangeData::new(Point3::origin(), vec![Point3::new(1.0, 0.0, 0.0)])
}

fn level_imu(builder: &mut LocalTrajectoryBuilder, timestamp_us: u64) {
    builder.add_imu(
        timestamp_us,
        Vector3::new(0.0, 0.0, G),
        Vector3::zeros(),
        UnitQuaternion::identity(),
    );
}

#[test]
fn single_scan_inserts_at_identity() {
    let mut builder = LocalTrajectoryBuilder::new(no_imu_config());

    let result = builder
        .add_horizontal_range(42_000, &single_point_scan())
        .expect("first scan must produce an insertion");

    assert_eq!(result.timestamp_us, 42_000);
    assert!(result.pose_estimate_2d.distance(&Pose2D::identity()) < 1e-3);
    assert!(result.pose_estimate_2d.theta.abs() < 1e-3);

    // The filtered scan kept the single return at (1, 0).
    assert_eq!(result.range_data_in_tracking_2d.returns.len(), 1);
    let point = result.range_data_in_tracking_2d.returns[0];
    assert!((point.x - 1.0).abs() < 1e-4);
    assert!(point.y.abs() < 1e-4);

    // The overlap submap is not bootstrapped yet: the first scan lands
    // in the initial matching target, which contains the point.
    assert_eq!(result.insertion_submaps.len(), 1);
    for submap in &result.insertion_submaps {
        let coord = submap.grid().world_to_grid(Point2::new(1.0, 0.0));
        assert!(
            submap.grid().probability(coord) > 0.5,
            "submap missing the inserted point"
        );
        assert_eq!(submap.num_range_data(), 1);
    }
}

#[test]
fn accumulation_batches_two_scans_into_one_result() {
    let config = LocalTrajectoryConfig {
        scans_per_accumulation: 2,
        ..no_imu_config()
    };
    let mut builder = LocalTrajectoryBuilder::new(config);

    assert!(builder.add_horizontal_range(0, &single_point_scan()).is_none());
    let result = builder
        .add_horizontal_range(100_000, &single_point_scan())
        .expect("second scan completes the batch");
    assert_eq!(result.timestamp_us, 100_000);

    // The accumulator restarted: the next scan opens a new batch.
    assert!(builder
        .add_horizontal_range(200_000, &single_point_scan())
        .is_none());
}

#[test]
fn out_of_range_return_becomes_synthetic_miss() {
    let config = LocalTrajectoryConfig {
        max_range: 10.0,
        missing_data_ray_length: 5.0,
        ..no_imu_config()
    };
    let mut builder = LocalTrajectoryBuilder::new(config);

    // One in-range return keeps the scan non-empty; the far point must
    // turn into a miss at 5 m along its ray.
    let scan = RangeData::new(
        Point3::origin(),
        vec![Point3::new(2.0, 0.0, 0.0), Point3::new(12.0, 0.0, 0.0)],
    );
    let result = builder
        .add_horizontal_range(0, &scan)
        .expect("scan with an in-range return inserts");

    assert_eq!(result.range_data_in_tracking_2d.returns.len(), 1);
    assert_eq!(result.range_data_in_tracking_2d.misses.len(), 1);
    let miss = result.range_data_in_tracking_2d.misses[0];
    assert!((miss.x - 5.0).abs() < 1e-3, "miss at {:?}", miss);
    assert!(miss.y.abs() < 1e-3);
}

#[test]
fn all_returns_filtered_out_emits_nothing() {
    let config = LocalTrajectoryConfig {
        max_range: 10.0,
        missing_data_ray_length: 5.0,
        ..no_imu_config()
    };
    let mut builder = LocalTrajectoryBuilder::new(config);

    // Only an out-of-range point: returns come out empty, nothing is
    // inserted, state survives.
    let scan = RangeData::new(Point3::origin(), vec![Point3::new(12.0, 0.0, 0.0)]);
    assert!(builder.add_horizontal_range(0, &scan).is_none());

    // A later valid scan still works.
    assert!(builder
        .add_horizontal_range(100_000, &single_point_scan())
        .is_some());
}

#[test]
fn scan_before_first_imu_is_dropped() {
    let mut builder = LocalTrajectoryBuilder::new(LocalTrajectoryConfig::default());

    assert!(builder.add_horizontal_range(0, &single_point_scan()).is_none());
    assert!(builder.pose_estimate().is_none());

    // Recovery is automatic once IMU arrives.
    level_imu(&mut builder, 100_000);
    assert!(builder
        .add_horizontal_range(200_000, &single_point_scan())
        .is_some());
}

#[test]
fn odometry_delta_shifts_next_scan_match() {
    let mut builder = LocalTrajectoryBuilder::new(LocalTrajectoryConfig::default());
    level_imu(&mut builder, 0);

    builder.add_odometer(100_000, &Rigid3::identity());
    builder.add_odometer(
        200_000,
        &Rigid3::from_translation(Vector3::new(1.0, 0.0, 0.0)),
    );

    // The correction now carries the 1 m delta from the wheels.
    let correction = builder.odometry_correction();
    assert!(
        (correction.translation.x - 1.0).abs() < 0.05,
        "correction = {:?}",
        correction.translation
    );
    assert!(!builder.odometer_priority_active());

    // The next accepted scan adopts the shifted prediction, then resets
    // the correction to identity.
    let result = builder
        .add_horizontal_range(300_000, &single_point_scan())
        .expect("scan inserts");
    assert!(
        (result.pose_estimate_2d.x - 1.0).abs() < 0.1,
        "pose = {:?}",
        result.pose_estimate_2d
    );
    let correction = builder.odometry_correction();
    assert!(correction.translation.norm() < 1e-5);
    assert!(correction.rotation.angle() < 1e-5);
}

#[test]
fn odometer_jump_engages_priority_mode_and_suppresses_velocity() {
    let mut builder = LocalTrajectoryBuilder::new(LocalTrajectoryConfig::default());
    level_imu(&mut builder, 0);

    builder.add_odometer(100_000, &Rigid3::identity());
    let first = builder.add_horizontal_range(200_000, &single_point_scan());
    assert!(first.is_some());

    // 3 m gap: squared distance 9 m² exceeds the 5 m² guard.
    builder.add_odometer(
        300_000,
        &Rigid3::from_translation(Vector3::new(3.0, 0.0, 0.0)),
    );
    assert!(builder.odometer_priority_active());

    // The correction trusts the wheels directly.
    let correction = builder.odometry_correction();
    assert!(
        (correction.translation.x - 3.0).abs() < 0.1,
        "correction = {:?}",
        correction.translation
    );

    // The matched pose jumps with the odometer, but the velocity update
    // is suppressed while the guard is engaged.
    let result = builder
        .add_horizontal_range(400_000, &single_point_scan())
        .expect("scan inserts after the jump");
    assert!(
        (result.pose_estimate_2d.x - 3.0).abs() < 0.2,
        "pose = {:?}",
        result.pose_estimate_2d
    );
    assert!(builder.odometer_priority_active());
    assert!(
        builder.velocity_estimate().norm() < 1e-3,
        "velocity = {:?}",
        builder.velocity_estimate()
    );
}

#[test]
fn zero_motion_thresholds_insert_every_scan() {
    let config = LocalTrajectoryConfig {
        motion_filter: MotionFilterConfig {
            max_time_seconds: 0.0,
            max_distance_meters: 0.0,
            max_angle_radians: 0.0,
        },
        ..no_imu_config()
    };
    let mut builder = LocalTrajectoryBuilder::new(config);

    for i in 0..5u64 {
        let result = builder.add_horizontal_range(i * 100_000, &single_point_scan());
        assert!(result.is_some(), "scan {} was gated", i);
    }
}

#[test]
fn stationary_scans_are_gated_after_first_insertion() {
    let mut builder = LocalTrajectoryBuilder::new(no_imu_config());

    assert!(builder.add_horizontal_range(0, &single_point_scan()).is_some());
    // Identical pose shortly after: rejected by the motion filter, but
    // the pose estimate keeps updating.
    for i in 1..4u64 {
        assert!(builder
            .add_horizontal_range(i * 100_000, &single_point_scan())
            .is_none());
        assert_eq!(
            builder.pose_estimate().unwrap().timestamp_us,
            i * 100_000
        );
    }
}

#[test]
fn insertion_timestamps_match_arrival_and_are_ordered() {
    let config = LocalTrajectoryConfig {
        motion_filter: MotionFilterConfig {
            max_time_seconds: 0.0,
            max_distance_meters: 0.0,
            max_angle_radians: 0.0,
        },
        ..no_imu_config()
    };
    let mut builder = LocalTrajectoryBuilder::new(config);

    let times: Vec<u64> = vec![0, 50_000, 50_000, 130_000, 400_000];
    let mut emitted = Vec::new();
    for &t in &times {
        if let Some(result) = builder.add_horizontal_range(t, &single_point_scan()) {
            emitted.push(result.timestamp_us);
        }
        assert_eq!(builder.time(), Some(t));
    }

    assert_eq!(emitted, times);
    assert!(emitted.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn pose_estimate_z_stays_zero() {
    let mut builder = LocalTrajectoryBuilder::new(no_imu_config());

    for i in 0..10u64 {
        builder.add_horizontal_range(i * 200_000, &single_point_scan());
        if let Some(estimate) = builder.pose_estimate() {
            assert_eq!(estimate.pose.translation.z, 0.0);
        }
    }
}

#[test]
fn submap_pair_rotates_while_streaming() {
    let config = LocalTrajectoryConfig {
        motion_filter: MotionFilterConfig {
            max_time_seconds: 0.0,
            max_distance_meters: 0.0,
            max_angle_radians: 0.0,
        },
        submaps: marga_slam::SubmapConfig {
            num_range_data: 3,
            grid_size: 100,
            ..Default::default()
        },
        ..no_imu_config()
    };
    let mut builder = LocalTrajectoryBuilder::new(config);

    let mut rotations = 0;
    for i in 0..10u64 {
        let result = builder
            .add_horizontal_range(i * 100_000, &single_point_scan())
            .expect("zero thresholds insert every scan");
        assert_eq!(builder.submaps().len(), 2);
        if result.insertion_submaps[0].finished() {
            // The matching target is finalized at exactly its window.
            assert_eq!(result.insertion_submaps[0].num_range_data(), 3);
            rotations += 1;
        }
    }

    // 10 insertions at a window of 3: the pair rotated several times and
    // the oldest submap always carries at least as much data.
    assert!(rotations >= 2, "rotations = {}", rotations);
    assert!(
        builder.submaps()[0].num_range_data() >= builder.submaps()[1].num_range_data()
    );
}

#[test]
fn point_cloud_is_reported_in_map_frame() {
    let mut builder = LocalTrajectoryBuilder::new(LocalTrajectoryConfig::default());
    level_imu(&mut builder, 0);

    builder.add_odometer(100_000, &Rigid3::identity());
    builder.add_odometer(
        200_000,
        &Rigid3::from_translation(Vector3::new(1.0, 0.0, 0.0)),
    );
    builder.add_horizontal_range(300_000, &single_point_scan());

    // With the platform matched near x = 1, the scan's point at 1 m
    // ahead lands near x = 2 in the map frame.
    let estimate = builder.pose_estimate().expect("scan processed");
    assert_eq!(estimate.point_cloud.len(), 1);
    assert!(
        (estimate.point_cloud[0].x - 2.0).abs() < 0.15,
        "map point = {:?}",
        estimate.point_cloud[0]
    );
}
