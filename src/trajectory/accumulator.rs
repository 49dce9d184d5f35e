//! Multi-scan range accumulation.
//!
//! Consecutive scans are merged into one composite in the tracking frame
//! of the batch's first scan, so that platform motion between scans does
//! not smear the composite. While merging, the min/max range policy is
//! applied per return:
//!
//! - closer than `min_range`: discarded (self-hits, sensor cowling)
//! - within `[min_range, max_range]`: kept as a return
//! - beyond `max_range`: converted into a synthetic miss at
//!   `missing_data_ray_length` along the same ray, preserving the
//!   free-space information without trusting the far reading
//!
//! Once `scans_per_accumulation` scans are merged, the composite is
//! transformed into the newest tracking frame, handed back, and the
//! accumulator resets.

use crate::core::{RangeData, Rigid3};

/// Batches consecutive scans into one composite range data set.
pub struct RangeAccumulator {
    scans_per_accumulation: usize,
    min_range: f32,
    max_range: f32,
    missing_data_ray_length: f32,

    num_accumulated: usize,
    first_pose: Rigid3,
    accumulated: RangeData,
}

impl RangeAccumulator {
    /// Create an accumulator with the given batch size and range policy.
    pub fn new(
        scans_per_accumulation: usize,
        min_range: f32,
        max_range: f32,
        missing_data_ray_length: f32,
    ) -> Self {
        assert!(scans_per_accumulation >= 1);
        Self {
            scans_per_accumulation,
            min_range,
            max_range,
            missing_data_ray_length,
            num_accumulated: 0,
            first_pose: Rigid3::identity(),
            accumulated: RangeData::empty(),
        }
    }

    /// Number of scans currently held.
    #[inline]
    pub fn num_accumulated(&self) -> usize {
        self.num_accumulated
    }

    /// Merge a scan taken at `pose_estimate` into the batch.
    ///
    /// Returns the composite (in the current tracking frame) when the
    /// batch is complete, resetting the accumulator.
    pub fn add_scan(
        &mut self,
        range_data: &RangeData,
        pose_estimate: &Rigid3,
    ) -> Option<RangeData> {
        if self.num_accumulated == 0 {
            self.first_pose = *pose_estimate;
            self.accumulated = RangeData::empty();
        }

        let tracking_delta = self.first_pose.inverse().compose(pose_estimate);
        let in_first_tracking = range_data.transform(&tracking_delta);

        for hit in &in_first_tracking.returns {
            let delta = hit - in_first_tracking.origin;
            let range = delta.norm();
            if range < self.min_range {
                continue;
            }
            if range <= self.max_range {
                self.accumulated.returns.push(*hit);
            } else {
                self.accumulated
                    .misses
                    .push(in_first_tracking.origin + (self.missing_data_ray_length / range) * delta);
            }
        }

        self.num_accumulated += 1;
        if self.num_accumulated < self.scans_per_accumulation {
            return None;
        }

        self.num_accumulated = 0;
        let composite = std::mem::take(&mut self.accumulated);
        Some(composite.transform(&tracking_delta.inverse()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_single_scan_batch_passes_through() {
        let mut accumulator = RangeAccumulator::new(1, 0.2, 10.0, 5.0);
        let data = RangeData::new(Point3::origin(), vec![Point3::new(1.0, 0.0, 0.0)]);

        let composite = accumulator
            .add_scan(&data, &Rigid3::identity())
            .expect("batch of one completes immediately");

        assert_eq!(composite.returns.len(), 1);
        assert!((composite.returns[0].x - 1.0).abs() < 1e-6);
        assert_eq!(accumulator.num_accumulated(), 0);
    }

    #[test]
    fn test_min_range_boundary() {
        let mut accumulator = RangeAccumulator::new(1, 0.2, 10.0, 5.0);
        let data = RangeData::new(
            Point3::origin(),
            vec![
                Point3::new(0.1, 0.0, 0.0), // below min: dropped
                Point3::new(0.2, 0.0, 0.0), // exactly min: kept
            ],
        );

        let composite = accumulator.add_scan(&data, &Rigid3::identity()).unwrap();
        assert_eq!(composite.returns.len(), 1);
        assert!((composite.returns[0].x - 0.2).abs() < 1e-6);
        assert!(composite.misses.is_empty());
    }

    #[test]
    fn test_max_range_boundary_and_synthetic_miss() {
        let mut accumulator = RangeAccumulator::new(1, 0.0, 10.0, 5.0);
        let data = RangeData::new(
            Point3::origin(),
            vec![
                Point3::new(10.0, 0.0, 0.0), // exactly max: return
                Point3::new(12.0, 0.0, 0.0), // beyond: miss at 5 m
            ],
        );

        let composite = accumulator.add_scan(&data, &Rigid3::identity()).unwrap();
        assert_eq!(composite.returns.len(), 1);
        assert_eq!(composite.misses.len(), 1);
        assert!(
            (composite.misses[0].x - 5.0).abs() < 1e-5,
            "miss at {:?}",
            composite.misses[0]
        );
    }

    #[test]
    fn test_two_scan_batch_merges_in_first_frame() {
        let mut accumulator = RangeAccumulator::new(2, 0.0, 10.0, 5.0);
        let data = RangeData::new(Point3::origin(), vec![Point3::new(1.0, 0.0, 0.0)]);

        let first = accumulator.add_scan(&data, &Rigid3::identity());
        assert!(first.is_none());
        assert_eq!(accumulator.num_accumulated(), 1);

        // Platform moved 0.5 m forward between scans.
        let moved = Rigid3::from_translation(Vector3::new(0.5, 0.0, 0.0));
        let composite = accumulator.add_scan(&data, &moved).unwrap();

        assert_eq!(composite.returns.len(), 2);
        // In the current (moved) tracking frame: the first scan's point
        // sits 0.5 m behind, the second at its measured position.
        let xs: Vec<f32> = composite.returns.iter().map(|p| p.x).collect();
        assert!(xs.iter().any(|&x| (x - 0.5).abs() < 1e-5), "xs = {:?}", xs);
        assert!(xs.iter().any(|&x| (x - 1.0).abs() < 1e-5), "xs = {:?}", xs);
    }

    #[test]
    fn test_accumulator_resets_after_emission() {
        let mut accumulator = RangeAccumulator::new(2, 0.0, 10.0, 5.0);
        let data = RangeData::new(Point3::origin(), vec![Point3::new(1.0, 0.0, 0.0)]);

        accumulator.add_scan(&data, &Rigid3::identity());
        accumulator.add_scan(&data, &Rigid3::identity()).unwrap();

        // Next batch starts from scratch.
        assert_eq!(accumulator.num_accumulated(), 0);
        let first_of_next = accumulator.add_scan(&data, &Rigid3::identity());
        assert!(first_of_next.is_none());
    }

    #[test]
    fn test_range_measured_from_scan_origin() {
        let mut accumulator = RangeAccumulator::new(1, 0.0, 2.0, 1.0);
        // Origin displaced: the point is 1 m from the origin, although
        // 3 m from the frame zero.
        let data = RangeData::new(
            Point3::new(2.0, 0.0, 0.0),
            vec![Point3::new(3.0, 0.0, 0.0)],
        );

        let composite = accumulator.add_scan(&data, &Rigid3::identity()).unwrap();
        assert_eq!(composite.returns.len(), 1);
        assert!(composite.misses.is_empty());
    }
}
