//! Range-finder measurement sets.
//!
//! A [`RangeData`] bundles one sweep of the range finder: the sensor
//! origin, the surface hits (`returns`), and free-space endpoints
//! synthesized from out-of-range rays (`misses`). Origin and all points
//! always share a single frame; transforming the set transforms all
//! three together.

use nalgebra::Point3;

use super::rigid::Rigid3;

/// An origin plus return and miss point sets, all in one frame.
#[derive(Clone, Debug, Default)]
pub struct RangeData {
    /// Sensor origin at measurement time.
    pub origin: Point3<f32>,
    /// Observed surface hits.
    pub returns: Vec<Point3<f32>>,
    /// Free-space endpoints from rays that saw nothing in range.
    pub misses: Vec<Point3<f32>>,
}

impl RangeData {
    /// Create a range data set with the given origin and returns.
    pub fn new(origin: Point3<f32>, returns: Vec<Point3<f32>>) -> Self {
        Self {
            origin,
            returns,
            misses: Vec::new(),
        }
    }

    /// An empty set with the origin at zero.
    pub fn empty() -> Self {
        Self {
            origin: Point3::origin(),
            returns: Vec::new(),
            misses: Vec::new(),
        }
    }

    /// Total number of points (returns + misses).
    #[inline]
    pub fn len(&self) -> usize {
        self.returns.len() + self.misses.len()
    }

    /// True when there are neither returns nor misses.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty() && self.misses.is_empty()
    }

    /// Transform origin and both point sets into another frame.
    pub fn transform(&self, transform: &Rigid3) -> RangeData {
        RangeData {
            origin: transform.transform_point(&self.origin),
            returns: self
                .returns
                .iter()
                .map(|p| transform.transform_point(p))
                .collect(),
            misses: self
                .misses
                .iter()
                .map(|p| transform.transform_point(p))
                .collect(),
        }
    }

    /// Keep only points whose z lies inside `[min_z, max_z]`.
    ///
    /// The origin is kept regardless of its z.
    pub fn crop_z(&self, min_z: f32, max_z: f32) -> RangeData {
        let in_band = |p: &&Point3<f32>| p.z >= min_z && p.z <= max_z;
        RangeData {
            origin: self.origin,
            returns: self.returns.iter().filter(in_band).copied().collect(),
            misses: self.misses.iter().filter(in_band).copied().collect(),
        }
    }
}
