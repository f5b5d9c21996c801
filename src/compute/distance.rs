//! Exact distance filtering for regions.

use crate::compute::sizing::cap_radius;
use crate::compute::validation::validate_radius;
use crate::error::Result;
use geo::{Distance, Geodesic, Haversine, Rhumb};
use geolive_types::{Coordinate, DistanceMetric};

/// Distance in meters between two coordinates under `metric`.
///
/// ```rust
/// use geolive::compute::distance::distance_between;
/// use geolive::{Coordinate, DistanceMetric};
///
/// let nyc = Coordinate::new(40.7128, -74.0060).unwrap();
/// let la = Coordinate::new(34.0522, -118.2437).unwrap();
///
/// let dist = distance_between(&nyc, &la, DistanceMetric::Haversine);
/// assert!(dist > 3_900_000.0); // ~3,944 km
/// ```
pub fn distance_between(a: &Coordinate, b: &Coordinate, metric: DistanceMetric) -> f64 {
    let (p1, p2) = (a.to_point(), b.to_point());
    match metric {
        DistanceMetric::Haversine => Haversine.distance(p1, p2),
        DistanceMetric::Geodesic => Geodesic.distance(p1, p2),
        DistanceMetric::Rhumb => Rhumb.distance(p1, p2),
    }
}

/// A circular query region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    center: Coordinate,
    radius: f64,
}

impl Region {
    /// Validate `radius` and cap it at `max_radius`.
    pub fn new(center: Coordinate, radius: f64, max_radius: f64) -> Result<Self> {
        let radius = cap_radius(validate_radius(radius)?, max_radius);
        Ok(Self { center, radius })
    }

    #[inline]
    pub fn center(&self) -> Coordinate {
        self.center
    }

    /// Radius in meters, after capping.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Exact membership test.
    pub fn contains(&self, location: &Coordinate, metric: DistanceMetric) -> bool {
        distance_between(&self.center, location, metric) <= self.radius
    }
}
