//! Integer ray traversal for grid updates.
//!
//! Bresenham's line algorithm yields every cell between two grid
//! coordinates, endpoints included, using only integer arithmetic. The
//! insertion code walks each range-finder ray with it, applying miss
//! updates along the body of the ray and a hit update at a return's
//! endpoint.

use super::probability_grid::GridCoord;

/// Iterator over the cells of a grid-aligned line segment.
///
/// Yields cells from `start` to `end` inclusive, with no gaps.
pub struct BresenhamLine {
    x: i32,
    y: i32,
    end_x: i32,
    end_y: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl BresenhamLine {
    /// Create an iterator from `start` to `end`.
    pub fn new(start: GridCoord, end: GridCoord) -> Self {
        let dx = (end.x - start.x).abs();
        let dy = -(end.y - start.y).abs();
        Self {
            x: start.x,
            y: start.y,
            end_x: end.x,
            end_y: end.y,
            dx,
            dy,
            sx: if end.x >= start.x { 1 } else { -1 },
            sy: if end.y >= start.y { 1 } else { -1 },
            err: dx + dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = GridCoord;

    fn next(&mut self) -> Option<GridCoord> {
        if self.done {
            return None;
        }
        let current = GridCoord::new(self.x, self.y);

        if self.x == self.end_x && self.y == self.end_y {
            self.done = true;
            return Some(current);
        }

        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }

        Some(current)
    }
}
