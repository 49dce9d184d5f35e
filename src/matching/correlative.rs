//! Real-time correlative scan matching.
//!
//! Brute-force search over a (Δx, Δy, Δθ) window around the predicted
//! pose. Each candidate is scored by the mean occupancy probability
//! under the scan's return points, discounted by how far the candidate
//! strays from the prediction; the discount breaks ties toward the
//! prediction wherever the occupancy evidence is flat (empty or freshly
//! started submaps).
//!
//! The result seeds the nonlinear refinement stage, which needs an
//! initial estimate within roughly one grid cell of the optimum.

use nalgebra::{Point2, Point3};

use crate::core::Pose2D;
use crate::grid::ProbabilityGrid;

use super::config::CorrelativeMatcherConfig;

/// Exhaustive windowed search matcher.
pub struct CorrelativeMatcher {
    config: CorrelativeMatcherConfig,
}

impl CorrelativeMatcher {
    /// Create a matcher with the given configuration.
    pub fn new(config: CorrelativeMatcherConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &CorrelativeMatcherConfig {
        &self.config
    }

    /// Search the window around `prediction` for the best-scoring pose.
    ///
    /// Returns the refined pose and its discounted score. `points` are
    /// scan returns in the gravity-aligned tracking frame; only x and y
    /// participate in scoring.
    pub fn match_scan(
        &self,
        prediction: &Pose2D,
        points: &[Point3<f32>],
        grid: &ProbabilityGrid,
    ) -> (Pose2D, f32) {
        debug_assert!(!points.is_empty(), "correlative matcher fed an empty cloud");

        let linear_steps =
            (self.config.linear_search_window / self.config.linear_step).ceil() as i32;
        let angular_steps =
            (self.config.angular_search_window / self.config.angular_step).ceil() as i32;

        let mut best_pose = *prediction;
        let mut best_score = f32::NEG_INFINITY;

        for dtheta_step in -angular_steps..=angular_steps {
            let theta = prediction.theta + dtheta_step as f32 * self.config.angular_step;
            let (sin_t, cos_t) = theta.sin_cos();

            // Rotate once per angle; translation shifts reuse the result.
            let rotated: Vec<(f32, f32)> = points
                .iter()
                .map(|p| (p.x * cos_t - p.y * sin_t, p.x * sin_t + p.y * cos_t))
                .collect();

            for dx_step in -linear_steps..=linear_steps {
                let x = prediction.x + dx_step as f32 * self.config.linear_step;

                for dy_step in -linear_steps..=linear_steps {
                    let y = prediction.y + dy_step as f32 * self.config.linear_step;

                    let mut sum = 0.0f32;
                    for &(rx, ry) in &rotated {
                        let coord = grid.world_to_grid(Point2::new(x + rx, y + ry));
                        sum += grid.probability(coord);
                    }
                    let occupancy = sum / points.len() as f32;

                    let translation_delta = ((x - prediction.x) * (x - prediction.x)
                        + (y - prediction.y) * (y - prediction.y))
                        .sqrt();
                    let rotation_delta = (theta - prediction.theta).abs();
                    let score = occupancy
                        - self.config.translation_delta_cost_weight * translation_delta
                        - self.config.rotation_delta_cost_weight * rotation_delta;

                    if score > best_score {
                        best_score = score;
                        best_pose = Pose2D::new(x, y, theta);
                    }
                }
            }
        }

        (best_pose, best_score)
    }
}
