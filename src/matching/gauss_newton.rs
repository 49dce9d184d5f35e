//! Nonlinear scan-to-grid refinement.
//!
//! Least-squares polish of the correlative estimate against the bilinear
//! occupancy surface of the matching submap. The cost combines three
//! residual groups:
//!
//! 1. **Occupancy**: `1 - P(T(pᵢ))` per return point, interpolated
//!    bilinearly so the surface is differentiable between cell centers.
//! 2. **Translation**: deviation from the coarse (correlative) estimate.
//! 3. **Rotation**: deviation from the original pose prediction, which
//!    keeps the gyro-derived heading authoritative when the grid is
//!    ambiguous.
//!
//! Solved by damped Gauss-Newton on 3×3 normal equations; steps that
//! raise the cost are rejected and retried with heavier damping.

use nalgebra::{Point2, Point3};

use crate::core::{normalize_angle, Pose2D};
use crate::grid::ProbabilityGrid;

use super::config::GaussNewtonMatcherConfig;

/// Outcome report of a refinement run.
#[derive(Clone, Copy, Debug)]
pub struct MatchSummary {
    /// Iterations actually executed.
    pub iterations: usize,
    /// Whether the update magnitude fell below the convergence threshold.
    pub converged: bool,
    /// Total cost at the returned pose.
    pub final_cost: f32,
}

/// Damped Gauss-Newton matcher against a probability grid.
pub struct GaussNewtonMatcher {
    config: GaussNewtonMatcherConfig,
}

impl GaussNewtonMatcher {
    /// Create a matcher with the given configuration.
    pub fn new(config: GaussNewtonMatcherConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GaussNewtonMatcherConfig {
        &self.config
    }

    /// Refine `initial_pose` against the grid.
    ///
    /// `prediction` anchors the rotation residual; `initial_pose` (the
    /// correlative output) anchors the translation residual and seeds the
    /// optimization. `points` are returns in the gravity-aligned tracking
    /// frame.
    pub fn match_scan(
        &self,
        prediction: &Pose2D,
        initial_pose: &Pose2D,
        points: &[Point3<f32>],
        grid: &ProbabilityGrid,
    ) -> (Pose2D, MatchSummary) {
        debug_assert!(!points.is_empty(), "gauss-newton matcher fed an empty cloud");

        let occupancy_weight = self.config.occupied_space_weight / points.len() as f32;
        let mut pose = *initial_pose;
        let mut damping = self.config.damping;
        let mut cost = self.cost(&pose, prediction, initial_pose, points, grid, occupancy_weight);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let (mut h, g) =
                self.normal_equations(&pose, prediction, initial_pose, points, grid, occupancy_weight);

            for i in 0..3 {
                h[i][i] += damping * (1.0 + h[i][i]);
            }

            let Some(delta) = solve_3x3(&h, &[-g[0], -g[1], -g[2]]) else {
                break;
            };
            if delta.iter().any(|d| !d.is_finite()) {
                break;
            }

            let candidate = Pose2D::new(
                pose.x + delta[0],
                pose.y + delta[1],
                normalize_angle(pose.theta + delta[2]),
            );
            let candidate_cost =
                self.cost(&candidate, prediction, initial_pose, points, grid, occupancy_weight);

            if candidate_cost < cost {
                pose = candidate;
                cost = candidate_cost;
                damping = (damping * 0.5).max(1e-6);

                let step = (delta[0] * delta[0] + delta[1] * delta[1]).sqrt();
                if step < self.config.convergence_threshold {
                    converged = true;
                    break;
                }
            } else {
                damping *= 10.0;
                if damping > 1e3 {
                    break;
                }
            }
        }

        (
            pose,
            MatchSummary {
                iterations,
                converged,
                final_cost: cost,
            },
        )
    }

    /// Assemble the damped normal equations `H · δ = -g` at `pose`.
    fn normal_equations(
        &self,
        pose: &Pose2D,
        prediction: &Pose2D,
        initial_pose: &Pose2D,
        points: &[Point3<f32>],
        grid: &ProbabilityGrid,
        occupancy_weight: f32,
    ) -> ([[f32; 3]; 3], [f32; 3]) {
        let mut h = [[0.0f32; 3]; 3];
        let mut g = [0.0f32; 3];
        let (sin_t, cos_t) = pose.theta.sin_cos();

        for p in points {
            let world_x = pose.x + p.x * cos_t - p.y * sin_t;
            let world_y = pose.y + p.x * sin_t + p.y * cos_t;

            let (prob, dp_dx, dp_dy) =
                grid.probability_interpolated(Point2::new(world_x, world_y));
            let residual = 1.0 - prob;

            let dwx_dtheta = -p.x * sin_t - p.y * cos_t;
            let dwy_dtheta = p.x * cos_t - p.y * sin_t;
            // d(residual)/d(pose) = -dP/d(pose)
            let j = [
                -dp_dx,
                -dp_dy,
                -(dp_dx * dwx_dtheta + dp_dy * dwy_dtheta),
            ];

            for i in 0..3 {
                g[i] += occupancy_weight * j[i] * residual;
                for k in 0..3 {
                    h[i][k] += occupancy_weight * j[i] * j[k];
                }
            }
        }

        // Translation residual anchored to the coarse estimate.
        let tw = self.config.translation_weight;
        h[0][0] += tw;
        h[1][1] += tw;
        g[0] += tw * (pose.x - initial_pose.x);
        g[1] += tw * (pose.y - initial_pose.y);

        // Rotation residual anchored to the original prediction.
        let rw = self.config.rotation_weight;
        h[2][2] += rw;
        g[2] += rw * normalize_angle(pose.theta - prediction.theta);

        (h, g)
    }

    /// Total cost at `pose`.
    fn cost(
        &self,
        pose: &Pose2D,
        prediction: &Pose2D,
        initial_pose: &Pose2D,
        points: &[Point3<f32>],
        grid: &ProbabilityGrid,
        occupancy_weight: f32,
    ) -> f32 {
        let (sin_t, cos_t) = pose.theta.sin_cos();
        let mut cost = 0.0f32;

        for p in points {
            let world_x = pose.x + p.x * cos_t - p.y * sin_t;
            let world_y = pose.y + p.x * sin_t + p.y * cos_t;
            let (prob, _, _) = grid.probability_interpolated(Point2::new(world_x, world_y));
            let residual = 1.0 - prob;
            cost += occupancy_weight * residual * residual;
        }

        let dx = pose.x - initial_pose.x;
        let dy = pose.y - initial_pose.y;
        cost += self.config.translation_weight * (dx * dx + dy * dy);

        let dtheta = normalize_angle(pose.theta - prediction.theta);
        cost += self.config.rotation_weight * dtheta * dtheta;

        cost
    }
}

/// Solve a 3×3 linear system by Cramer's rule.
///
/// Returns `None` when the matrix is numerically singular.
fn solve_3x3(a: &[[f32; 3]; 3], b: &[f32; 3]) -> Option<[f32; 3]> {
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
    if det.abs() < 1e-12 {
        return None;
    }

    let mut result = [0.0f32; 3];
    for col in 0..3 {
        let mut m = *a;
        for row in 0..3 {
            m[row][col] = b[row];
        }
        let det_col = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        result[col] = det_col / det;
    }
    Some(result)
}
