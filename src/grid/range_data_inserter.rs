//! Range-data insertion into a probability grid.
//!
//! For every return, the cells between the origin and the endpoint
//! receive miss observations (free-space evidence) and the endpoint cell
//! a hit observation. Synthetic misses — endpoints of rays that saw
//! nothing in range — carve free space along their whole length,
//! endpoint included.

use nalgebra::Point2;

use crate::core::RangeData;

use super::probability_grid::ProbabilityGrid;
use super::raycaster::BresenhamLine;

/// Insert `range_data` (already in the grid's frame) into the grid.
pub fn insert_range_data(grid: &mut ProbabilityGrid, range_data: &RangeData) {
    let origin = grid.world_to_grid(Point2::new(range_data.origin.x, range_data.origin.y));

    for hit in &range_data.returns {
        let endpoint = grid.world_to_grid(Point2::new(hit.x, hit.y));
        for cell in BresenhamLine::new(origin, endpoint) {
            if cell == endpoint {
                grid.apply_hit(cell);
            } else {
                grid.apply_miss(cell);
            }
        }
    }

    for miss in &range_data.misses {
        let endpoint = grid.world_to_grid(Point2::new(miss.x, miss.y));
        for cell in BresenhamLine::new(origin, endpoint) {
            grid.apply_miss(cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::probability_grid::LogOddsParams;
    use nalgebra::Point3;

    fn make_grid() -> ProbabilityGrid {
        ProbabilityGrid::centered(
            200,
            0.05,
            Point2::new(0.0, 0.0),
            LogOddsParams::from_probabilities(0.65, 0.40),
        )
    }

    #[test]
    fn test_return_marks_hit_and_free_path() {
        let mut grid = make_grid();
        let data = RangeData::new(Point3::origin(), vec![Point3::new(2.0, 0.0, 0.0)]);

        insert_range_data(&mut grid, &data);

        let endpoint = grid.world_to_grid(Point2::new(2.0, 0.0));
        assert!(
            grid.probability(endpoint) > 0.5,
            "endpoint p = {}",
            grid.probability(endpoint)
        );

        let midway = grid.world_to_grid(Point2::new(1.0, 0.0));
        assert!(
            grid.probability(midway) < 0.5,
            "midway p = {}",
            grid.probability(midway)
        );
    }

    #[test]
    fn test_miss_ray_is_free_to_endpoint() {
        let mut grid = make_grid();
        let data = RangeData {
            origin: Point3::origin(),
            returns: vec![],
            misses: vec![Point3::new(3.0, 0.0, 0.0)],
        };

        insert_range_data(&mut grid, &data);

        // The synthetic miss endpoint is free space, not an obstacle.
        let endpoint = grid.world_to_grid(Point2::new(3.0, 0.0));
        assert!(grid.probability(endpoint) < 0.5);
        let midway = grid.world_to_grid(Point2::new(1.5, 0.0));
        assert!(grid.probability(midway) < 0.5);
    }

    #[test]
    fn test_repeated_insertion_sharpens_evidence() {
        let mut grid = make_grid();
        let data = RangeData::new(Point3::origin(), vec![Point3::new(1.0, 1.0, 0.0)]);

        insert_range_data(&mut grid, &data);
        let endpoint = grid.world_to_grid(Point2::new(1.0, 1.0));
        let p_once = grid.probability(endpoint);

        for _ in 0..4 {
            insert_range_data(&mut grid, &data);
        }
        let p_many = grid.probability(endpoint);

        assert!(p_many > p_once, "p_once = {}, p_many = {}", p_once, p_many);
    }

    #[test]
    fn test_off_grid_points_ignored() {
        let mut grid = make_grid();
        // Endpoint far outside the 10 m grid.
        let data = RangeData::new(Point3::origin(), vec![Point3::new(100.0, 0.0, 0.0)]);

        insert_range_data(&mut grid, &data);
        // In-grid cells along the ray still receive evidence.
        let near = grid.world_to_grid(Point2::new(2.0, 0.0));
        assert!(grid.probability(near) < 0.5);
    }
}
