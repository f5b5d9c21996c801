//! Region sizing: how many hash bits a range query can afford for a disc.
//!
//! A disc of radius `r` around a center is covered by the 3x3 block of cells
//! around the center cell as long as one cell is at least as tall as the
//! disc's latitude span and at least as wide as its longitude span. The
//! functions here find the largest bit count for which that holds.

use crate::compute::geohash::MAX_PRECISION_BITS;

/// Meters in one degree of latitude.
pub const METERS_PER_DEGREE_LATITUDE: f64 = 110_574.0;

/// Earth's meridional circumference in meters.
pub const EARTH_MERIDIONAL_CIRCUMFERENCE: f64 = 40_007_860.0;

/// WGS84 equatorial radius in meters.
pub const EARTH_EQ_RADIUS: f64 = 6_378_137.0;

/// WGS84 first eccentricity squared.
pub const EARTH_E2: f64 = 0.00669447819799;

pub const EPSILON: f64 = 1e-12;

/// Largest radius a region may have, in meters.
pub const MAX_SUPPORTED_RADIUS: f64 = 8_587_000.0;

/// Latitude span, in degrees, of `distance` meters.
#[inline]
pub fn distance_to_latitude_degrees(distance: f64) -> f64 {
    distance / METERS_PER_DEGREE_LATITUDE
}

/// Longitude span, in degrees, of `distance` meters at `latitude`.
///
/// Uses the WGS84 length of one degree of longitude. Where that length
/// vanishes (the poles) any positive distance spans the whole circle.
pub fn distance_to_longitude_degrees(distance: f64, latitude: f64) -> f64 {
    let radians = latitude.to_radians();
    let numerator = radians.cos() * EARTH_EQ_RADIUS * std::f64::consts::PI / 180.0;
    let denominator = (1.0 - EARTH_E2 * radians.sin() * radians.sin()).sqrt();
    let meters_per_degree = numerator / denominator;

    if meters_per_degree < EPSILON {
        if distance > 0.0 { 360.0 } else { 0.0 }
    } else {
        (distance / meters_per_degree).min(360.0)
    }
}

/// Bring a longitude back into [-180, 180].
///
/// ```
/// use geolive::compute::sizing::wrap_longitude;
///
/// assert_eq!(wrap_longitude(170.0), 170.0);
/// assert_eq!(wrap_longitude(190.0), -170.0);
/// assert_eq!(wrap_longitude(-190.0), 170.0);
/// ```
pub fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let adjusted = longitude + 180.0;
    if adjusted > 0.0 {
        (adjusted % 360.0) - 180.0
    } else {
        180.0 - (-adjusted % 360.0)
    }
}

/// Cap a radius at `max`, logging when it had to be reduced.
pub fn cap_radius(radius: f64, max: f64) -> f64 {
    if radius > max {
        log::warn!(
            "Radius {} m exceeds the supported maximum of {} m; capping",
            radius,
            max
        );
        max
    } else {
        radius
    }
}

/// Bits of latitude resolution whose cell height still covers `resolution`
/// meters.
pub fn bits_latitude(resolution: f64) -> f64 {
    (EARTH_MERIDIONAL_CIRCUMFERENCE / 2.0 / resolution)
        .log2()
        .min(MAX_PRECISION_BITS as f64)
}

/// Bits of longitude resolution whose cell width still covers `resolution`
/// meters at `latitude`.
pub fn bits_longitude(resolution: f64, latitude: f64) -> f64 {
    let degrees = distance_to_longitude_degrees(resolution, latitude);
    if degrees.abs() > 0.0 {
        (360.0 / degrees).log2().max(1.0)
    } else {
        MAX_PRECISION_BITS as f64
    }
}

/// Hash bit length for a disc of `radius` meters centered at `latitude`.
///
/// The result is in 1..=110, deterministic, and never grows with the radius.
/// Near the poles the longitude term collapses it to a single bit.
///
/// ```
/// use geolive::compute::sizing::bits_for_region;
///
/// assert_eq!(bits_for_region(35.0, 1000.0), 28);
/// assert_eq!(bits_for_region(90.0, 1000.0), 1);
/// ```
pub fn bits_for_region(latitude: f64, radius: f64) -> u32 {
    let lat_delta = distance_to_latitude_degrees(radius);
    let lat_north = (latitude + lat_delta).min(90.0);
    let lat_south = (latitude - lat_delta).max(-90.0);

    let bits_lat = bits_latitude(radius).floor() * 2.0;
    let bits_lng_north = bits_longitude(radius, lat_north).floor() * 2.0 - 1.0;
    let bits_lng_south = bits_longitude(radius, lat_south).floor() * 2.0 - 1.0;

    let bits = bits_lat.min(bits_lng_north).min(bits_lng_south);
    bits.clamp(1.0, MAX_PRECISION_BITS as f64) as u32
}
