//! Input validation for radii and hash precision. Coordinates validate
//! themselves in [`Coordinate::new`](geolive_types::Coordinate::new).

use crate::compute::geohash::MAX_PRECISION;
use crate::error::{GeoliveError, Result};

/// Validates a query radius in meters.
///
/// ```
/// use geolive::compute::validation::validate_radius;
///
/// assert!(validate_radius(0.0).is_ok());
/// assert!(validate_radius(1_000.0).is_ok());
/// assert!(validate_radius(-1.0).is_err());
/// assert!(validate_radius(f64::INFINITY).is_err());
/// ```
pub fn validate_radius(radius: f64) -> Result<f64> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(GeoliveError::InvalidRadius(radius));
    }
    Ok(radius)
}

/// Validates a hash precision in symbols.
pub fn validate_precision(precision: usize) -> Result<usize> {
    if !(1..=MAX_PRECISION).contains(&precision) {
        return Err(GeoliveError::InvalidPrecision(precision));
    }
    Ok(precision)
}
