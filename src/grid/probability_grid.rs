//! Log-odds occupancy grid.
//!
//! Cells store occupancy log-odds as fixed-point `i16` (value ×100), with
//! Bayesian updates `L_new = L_old + L_observation` clamped to a
//! configured band. A never-observed cell sits at log-odds 0, probability
//! 0.5.
//!
//! The grid covers a fixed bounding region: `origin` is the world
//! position of the (0, 0) cell corner and the region spans
//! `width × height` cells at `resolution` meters per cell.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Integer cell index into a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridCoord {
    /// Column index.
    pub x: i32,
    /// Row index.
    pub y: i32,
}

impl GridCoord {
    /// Create a new coordinate.
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Fixed-point log-odds increments and clamps (value ×100).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LogOddsParams {
    /// Increment applied for a hit observation.
    pub l_hit: i16,
    /// Increment applied for a miss observation (negative).
    pub l_miss: i16,
    /// Lower clamp.
    pub l_min: i16,
    /// Upper clamp.
    pub l_max: i16,
}

impl LogOddsParams {
    /// Derive increments from hit/miss probabilities.
    ///
    /// `L = 100 * ln(p / (1 - p))`; e.g. p_hit = 0.55 gives l_hit = 20.
    pub fn from_probabilities(hit_probability: f32, miss_probability: f32) -> Self {
        let to_log_odds = |p: f32| (100.0 * (p / (1.0 - p)).ln()).round() as i16;
        Self {
            l_hit: to_log_odds(hit_probability),
            l_miss: to_log_odds(miss_probability),
            l_min: -200,
            l_max: 200,
        }
    }
}

impl Default for LogOddsParams {
    fn default() -> Self {
        Self::from_probabilities(0.55, 0.49)
    }
}

/// 2D occupancy grid over clamped fixed-point log-odds.
#[derive(Clone, Debug)]
pub struct ProbabilityGrid {
    log_odds: Vec<i16>,
    width: usize,
    height: usize,
    resolution: f32,
    inv_resolution: f32,
    origin: Point2<f32>,
    params: LogOddsParams,
}

impl ProbabilityGrid {
    /// Create a grid of `width × height` cells with cell (0, 0) at
    /// `origin`.
    pub fn new(
        width: usize,
        height: usize,
        resolution: f32,
        origin: Point2<f32>,
        params: LogOddsParams,
    ) -> Self {
        assert!(resolution > 0.0, "grid resolution must be positive");
        Self {
            log_odds: vec![0; width * height],
            width,
            height,
            resolution,
            inv_resolution: 1.0 / resolution,
            origin,
            params,
        }
    }

    /// Create a square grid centered on a world point.
    pub fn centered(size: usize, resolution: f32, center: Point2<f32>, params: LogOddsParams) -> Self {
        let half = size as f32 * resolution / 2.0;
        let origin = Point2::new(center.x - half, center.y - half);
        Self::new(size, size, resolution, origin, params)
    }

    /// Grid width in cells.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Meters per cell.
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// World position of the (0, 0) cell corner.
    #[inline]
    pub fn origin(&self) -> Point2<f32> {
        self.origin
    }

    /// World bounds `(min, max)` of the covered region.
    pub fn bounds(&self) -> (Point2<f32>, Point2<f32>) {
        (
            self.origin,
            Point2::new(
                self.origin.x + self.width as f32 * self.resolution,
                self.origin.y + self.height as f32 * self.resolution,
            ),
        )
    }

    /// Convert a world point to the containing cell.
    #[inline]
    pub fn world_to_grid(&self, point: Point2<f32>) -> GridCoord {
        GridCoord::new(
            ((point.x - self.origin.x) * self.inv_resolution).floor() as i32,
            ((point.y - self.origin.y) * self.inv_resolution).floor() as i32,
        )
    }

    /// World position of a cell center.
    #[inline]
    pub fn grid_to_world(&self, coord: GridCoord) -> Point2<f32> {
        Point2::new(
            self.origin.x + (coord.x as f32 + 0.5) * self.resolution,
            self.origin.y + (coord.y as f32 + 0.5) * self.resolution,
        )
    }

    /// True when the coordinate lies inside the grid.
    #[inline]
    pub fn is_valid_coord(&self, coord: GridCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> usize {
        coord.y as usize * self.width + coord.x as usize
    }

    /// Raw log-odds of a cell (0 outside the grid).
    #[inline]
    pub fn log_odds(&self, coord: GridCoord) -> i16 {
        if self.is_valid_coord(coord) {
            self.log_odds[self.index(coord)]
        } else {
            0
        }
    }

    /// Occupancy probability of a cell (0.5 outside the grid or
    /// unobserved).
    #[inline]
    pub fn probability(&self, coord: GridCoord) -> f32 {
        log_odds_to_probability(self.log_odds(coord))
    }

    /// Apply a hit observation.
    pub fn apply_hit(&mut self, coord: GridCoord) {
        if !self.is_valid_coord(coord) {
            return;
        }
        let idx = self.index(coord);
        self.log_odds[idx] =
            (self.log_odds[idx] + self.params.l_hit).clamp(self.params.l_min, self.params.l_max);
    }

    /// Apply a miss observation.
    pub fn apply_miss(&mut self, coord: GridCoord) {
        if !self.is_valid_coord(coord) {
            return;
        }
        let idx = self.index(coord);
        self.log_odds[idx] =
            (self.log_odds[idx] + self.params.l_miss).clamp(self.params.l_min, self.params.l_max);
    }

    /// Bilinearly interpolated occupancy probability and its world-frame
    /// gradient at a point: `(p, dp_dx, dp_dy)`.
    ///
    /// Interpolation runs over the four surrounding cell centers; samples
    /// outside the grid read as 0.5, so the surface flattens toward the
    /// border.
    pub fn probability_interpolated(&self, point: Point2<f32>) -> (f32, f32, f32) {
        // Continuous coordinates in units of cells, relative to cell
        // centers.
        let u = (point.x - self.origin.x) * self.inv_resolution - 0.5;
        let v = (point.y - self.origin.y) * self.inv_resolution - 0.5;
        let x0 = u.floor();
        let y0 = v.floor();
        let fx = u - x0;
        let fy = v - y0;
        let x0 = x0 as i32;
        let y0 = y0 as i32;

        let p00 = self.probability(GridCoord::new(x0, y0));
        let p10 = self.probability(GridCoord::new(x0 + 1, y0));
        let p01 = self.probability(GridCoord::new(x0, y0 + 1));
        let p11 = self.probability(GridCoord::new(x0 + 1, y0 + 1));

        let p = p00 * (1.0 - fx) * (1.0 - fy)
            + p10 * fx * (1.0 - fy)
            + p01 * (1.0 - fx) * fy
            + p11 * fx * fy;
        let dp_dx = ((p10 - p00) * (1.0 - fy) + (p11 - p01) * fy) * self.inv_resolution;
        let dp_dy = ((p01 - p00) * (1.0 - fx) + (p11 - p10) * fx) * self.inv_resolution;

        (p, dp_dx, dp_dy)
    }

    /// Number of cells whose probability exceeds 0.5 (observed occupied).
    pub fn num_occupied_cells(&self) -> usize {
        self.log_odds.iter().filter(|&&l| l > 0).count()
    }
}

/// Convert fixed-point log-odds to probability.
#[inline]
pub fn log_odds_to_probability(log_odds: i16) -> f32 {
    let l = log_odds as f32 / 100.0;
    let e = l.exp();
    e / (1.0 + e)
}
