//! Region planning: the set of hash ranges that together cover a disc.
//!
//! ```rust
//! use geolive::compute::planner::bounds_for;
//! use geolive::Coordinate;
//!
//! let center = Coordinate::new(37.0, -122.0).unwrap();
//! let bounds = bounds_for(&center, 500.0).unwrap();
//! assert!((1..=9).contains(&bounds.len()));
//! ```

use crate::compute::geohash::{
    BITS_PER_CHAR, GeoHash, MAX_PRECISION_BITS, char_to_value, value_to_char,
};
use crate::compute::sizing::{
    bits_for_region, distance_to_latitude_degrees, distance_to_longitude_degrees, wrap_longitude,
};
use crate::error::{GeoliveError, Result};
use geolive_types::Coordinate;
use smallvec::SmallVec;
use std::fmt;

/// Sorts after every symbol of the hash alphabet.
pub const RANGE_SENTINEL: char = '~';

/// Up to nine bounds, kept inline.
pub type Bounds = SmallVec<[RegionBound; 9]>;

/// A half-open range `[start, end)` of sort tokens.
///
/// Bounds order by `start` first, which is the order the planner emits them
/// in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionBound {
    pub start: String,
    pub end: String,
}

impl RegionBound {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// True when `start <= hash < end`.
    #[inline]
    pub fn contains(&self, hash: &str) -> bool {
        self.start.as_str() <= hash && hash < self.end.as_str()
    }

    /// True when `other` overlaps or directly follows this bound.
    fn touches(&self, other: &RegionBound) -> bool {
        other.start <= self.end && self.start <= other.end
    }
}

impl fmt::Display for RegionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The bound of every hash sharing the first `bits` bits of `hash`.
///
/// `hash` must carry at least `ceil(bits / 5)` symbols; extra symbols are
/// ignored.
///
/// ```
/// use geolive::compute::geohash::GeoHash;
/// use geolive::compute::planner::bound_for_hash;
///
/// let hash = GeoHash::parse("9q8yy").unwrap();
/// let bound = bound_for_hash(&hash, 23).unwrap();
/// assert_eq!(bound.start, "9q8yw");
/// assert_eq!(bound.end, "9q8y~");
/// ```
pub fn bound_for_hash(hash: &GeoHash, bits: u32) -> Result<RegionBound> {
    let precision = bits.div_ceil(BITS_PER_CHAR) as usize;
    if bits == 0 || precision > hash.precision() {
        return Err(GeoliveError::InvalidInput(format!(
            "Cannot take {} bits from a {}-symbol hash",
            bits,
            hash.precision()
        )));
    }

    let hash = &hash.as_str()[..precision];
    let (base, last) = hash.split_at(precision - 1);
    let last_value = last.chars().next().map(char_to_value).transpose()?.unwrap_or(0);

    let significant_bits = bits - base.len() as u32 * BITS_PER_CHAR;
    let unused_bits = BITS_PER_CHAR - significant_bits;

    let start_value = (last_value >> unused_bits) << unused_bits;
    let end_value = start_value as u32 + (1 << unused_bits);

    let start = format!("{}{}", base, value_to_char(start_value)?);
    let end = if end_value > 31 {
        format!("{}{}", base, RANGE_SENTINEL)
    } else {
        format!("{}{}", base, value_to_char(end_value as u8)?)
    };

    Ok(RegionBound { start, end })
}

/// Sorted, disjoint bounds covering the disc of `radius` meters around
/// `center`. Never more than nine.
///
/// The radius is used as given; capping is the caller's concern.
pub fn bounds_for(center: &Coordinate, radius: f64) -> Result<Bounds> {
    bounds_with_max_bits(center, radius, MAX_PRECISION_BITS)
}

/// Like [`bounds_for`], but never finer than `max_bits` hash bits.
///
/// Sort tokens shorter than a bound's start would fall outside it, so callers
/// whose stored hashes carry fewer than 22 symbols cap the bit count at the
/// stored precision. Coarser bounds cover a superset of the disc.
pub fn bounds_with_max_bits(center: &Coordinate, radius: f64, max_bits: u32) -> Result<Bounds> {
    let bits = bits_for_region(center.latitude(), radius)
        .min(max_bits)
        .max(1);
    let precision = bits.div_ceil(BITS_PER_CHAR) as usize;

    let latitude = center.latitude();
    let longitude = center.longitude();
    let lat_delta = distance_to_latitude_degrees(radius);
    let lat_north = (latitude + lat_delta).min(90.0);
    let lat_south = (latitude - lat_delta).max(-90.0);
    // A span of half the circle reaches every longitude; a full turn would
    // wrap back onto the center.
    let lng_delta = distance_to_longitude_degrees(radius, lat_north)
        .max(distance_to_longitude_degrees(radius, lat_south))
        .min(180.0);

    let latitudes = [latitude, lat_north, lat_south];
    let longitudes = [
        longitude,
        wrap_longitude(longitude - lng_delta),
        wrap_longitude(longitude + lng_delta),
    ];

    let mut bounds = Bounds::new();
    for lat in latitudes {
        for lng in longitudes {
            let sample = Coordinate::new(lat, lng)?;
            let hash = GeoHash::encode(&sample, precision)?;
            let bound = bound_for_hash(&hash, bits)?;
            if !bounds.contains(&bound) {
                bounds.push(bound);
            }
        }
    }

    Ok(merge_bounds(bounds))
}

/// Sort by start and join bounds that overlap or touch.
pub fn merge_bounds(mut bounds: Bounds) -> Bounds {
    bounds.sort();

    let mut merged = Bounds::new();
    for bound in bounds {
        match merged.last_mut() {
            Some(previous) if previous.touches(&bound) => {
                if bound.end > previous.end {
                    previous.end = bound.end;
                }
            }
            _ => merged.push(bound),
        }
    }
    merged
}

/// True when `hash` falls in any of `bounds`.
pub fn hash_may_be_in_bounds(hash: &str, bounds: &[RegionBound]) -> bool {
    bounds.iter().any(|bound| bound.contains(hash))
}
