//! Scan matcher configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for the correlative (grid search) matcher stage.
///
/// The matcher exhaustively scores every pose in a (Δx, Δy, Δθ) window
/// around the prediction and keeps the best one. Window sizes bound how
/// much prediction error the stage can recover.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorrelativeMatcherConfig {
    /// Half-width of the linear search window in x and y (meters).
    ///
    /// Default: 0.1
    #[serde(default = "default_linear_search_window")]
    pub linear_search_window: f32,

    /// Half-width of the angular search window (radians).
    ///
    /// Default: 0.35 (~20 degrees)
    #[serde(default = "default_angular_search_window")]
    pub angular_search_window: f32,

    /// Linear step size (meters). Usually the grid resolution.
    ///
    /// Default: 0.025
    #[serde(default = "default_linear_step")]
    pub linear_step: f32,

    /// Angular step size (radians).
    ///
    /// Default: 0.0175 (~1 degree)
    #[serde(default = "default_angular_step")]
    pub angular_step: f32,

    /// Score discount per meter of translation away from the prediction.
    ///
    /// Breaks ties toward the prediction when occupancy evidence is flat.
    /// Default: 0.1
    #[serde(default = "default_delta_cost_weight")]
    pub translation_delta_cost_weight: f32,

    /// Score discount per radian of rotation away from the prediction.
    ///
    /// Default: 0.1
    #[serde(default = "default_delta_cost_weight")]
    pub rotation_delta_cost_weight: f32,
}

fn default_linear_search_window() -> f32 {
    0.1
}
fn default_angular_search_window() -> f32 {
    0.35
}
fn default_linear_step() -> f32 {
    0.025
}
fn default_angular_step() -> f32 {
    0.0175
}
fn default_delta_cost_weight() -> f32 {
    0.1
}

impl Default for CorrelativeMatcherConfig {
    fn default() -> Self {
        Self {
            linear_search_window: default_linear_search_window(),
            angular_search_window: default_angular_search_window(),
            linear_step: default_linear_step(),
            angular_step: default_angular_step(),
            translation_delta_cost_weight: default_delta_cost_weight(),
            rotation_delta_cost_weight: default_delta_cost_weight(),
        }
    }
}

impl CorrelativeMatcherConfig {
    /// Number of candidate poses the configured windows produce.
    pub fn search_space_size(&self) -> usize {
        let linear = (2.0 * self.linear_search_window / self.linear_step) as usize + 1;
        let angular = (2.0 * self.angular_search_window / self.angular_step) as usize + 1;
        linear * linear * angular
    }
}

/// Configuration for the nonlinear (least-squares) matcher stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GaussNewtonMatcherConfig {
    /// Weight of the occupancy residuals.
    ///
    /// Default: 1.0
    #[serde(default = "default_occupied_space_weight")]
    pub occupied_space_weight: f32,

    /// Weight of the translation deviation from the coarse estimate.
    ///
    /// Default: 10.0
    #[serde(default = "default_translation_weight")]
    pub translation_weight: f32,

    /// Weight of the rotation deviation from the original prediction.
    ///
    /// Default: 40.0
    #[serde(default = "default_rotation_weight")]
    pub rotation_weight: f32,

    /// Maximum Gauss-Newton iterations.
    ///
    /// Default: 20
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Convergence threshold on the pose update magnitude (meters).
    ///
    /// Default: 1e-4
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f32,

    /// Initial Levenberg-Marquardt damping on the normal equations.
    ///
    /// Default: 1e-3
    #[serde(default = "default_damping")]
    pub damping: f32,

    /// Match against adaptive-voxel-filtered returns rather than the raw
    /// composite returns.
    ///
    /// Default: true
    #[serde(default = "default_true")]
    pub use_filtered_returns: bool,
}

fn default_occupied_space_weight() -> f32 {
    1.0
}
fn default_translation_weight() -> f32 {
    10.0
}
fn default_rotation_weight() -> f32 {
    40.0
}
fn default_max_iterations() -> usize {
    20
}
fn default_convergence_threshold() -> f32 {
    1e-4
}
fn default_damping() -> f32 {
    1e-3
}
fn default_true() -> bool {
    true
}

impl Default for GaussNewtonMatcherConfig {
    fn default() -> Self {
        Self {
            occupied_space_weight: default_occupied_space_weight(),
            translation_weight: default_translation_weight(),
            rotation_weight: default_rotation_weight(),
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            damping: default_damping(),
            use_filtered_returns: default_true(),
        }
    }
}
