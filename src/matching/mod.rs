//! Two-stage scan matching against the active submap.
//!
//! 1. [`CorrelativeMatcher`] — exhaustive grid search over a pose window,
//!    scoring candidates by summed occupancy; recovers coarse prediction
//!    error and seeds the second stage.
//! 2. [`GaussNewtonMatcher`] — damped least-squares refinement against
//!    the bilinearly interpolated occupancy surface, regularized toward
//!    the coarse translation and the predicted rotation.
//!
//! Neither stage mutates the grid; both operate on return points in the
//! gravity-aligned 2D tracking frame.

mod config;
mod correlative;
mod gauss_newton;

pub use config::{CorrelativeMatcherConfig, GaussNewtonMatcherConfig};
pub use correlative::CorrelativeMatcher;
pub use gauss_newton::{GaussNewtonMatcher, MatchSummary};
