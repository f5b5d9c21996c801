//! Base-32 spatial hash codec.
//!
//! A hash interleaves bisection bits of longitude (even positions) and
//! latitude (odd positions), most significant first, five bits per symbol.
//! Equal-length hashes sort along a Z-order curve, which is what lets a range
//! of sort tokens stand in for a rectangle of the map.
//!
//! ```rust
//! use geolive::compute::geohash::{decode, encode};
//! use geolive::Coordinate;
//!
//! let sf = Coordinate::new(37.7749, -122.4194).unwrap();
//! let hash = encode(&sf, 10).unwrap();
//! assert_eq!(hash.as_str(), "9q8yyk8ytp");
//!
//! let center = decode(hash.as_str()).unwrap();
//! assert!((center.latitude() - 37.7749).abs() < 1e-4);
//! ```

use crate::error::{GeoliveError, Result};
use geolive_types::Coordinate;
use std::fmt;
use std::str::FromStr;

/// Bits carried by one base-32 symbol.
pub const BITS_PER_CHAR: u32 = 5;

/// Precision used when none is given.
pub const DEFAULT_PRECISION: usize = 10;

/// Longest supported hash, in symbols.
pub const MAX_PRECISION: usize = 22;

/// Longest supported hash, in bits.
pub const MAX_PRECISION_BITS: u32 = MAX_PRECISION as u32 * BITS_PER_CHAR;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Symbol for a 5-bit value.
pub fn value_to_char(value: u8) -> Result<char> {
    BASE32
        .get(value as usize)
        .map(|&b| b as char)
        .ok_or_else(|| GeoliveError::InvalidInput(format!("Not a valid base32 value: {}", value)))
}

/// 5-bit value of a symbol.
pub fn char_to_value(c: char) -> Result<u8> {
    BASE32
        .iter()
        .position(|&b| b as char == c)
        .map(|pos| pos as u8)
        .ok_or_else(|| GeoliveError::InvalidGeohash(c.to_string()))
}

/// True when every character belongs to the alphabet. The empty string is
/// trivially valid here; [`GeoHash::parse`] rejects it separately.
pub fn is_valid_hash(hash: &str) -> bool {
    hash.bytes().all(|b| BASE32.contains(&b))
}

/// A closed interval being narrowed by bisection.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Interval {
    min: f64,
    max: f64,
}

impl Interval {
    const LONGITUDE: Interval = Interval {
        min: -180.0,
        max: 180.0,
    };
    const LATITUDE: Interval = Interval {
        min: -90.0,
        max: 90.0,
    };

    #[inline]
    fn mid(self) -> f64 {
        (self.min + self.max) / 2.0
    }

    /// The half selected by `upper`.
    #[inline]
    fn bisect(self, upper: bool) -> Interval {
        let mid = self.mid();
        if upper {
            Interval { min: mid, ..self }
        } else {
            Interval { max: mid, ..self }
        }
    }
}

/// An immutable, validated spatial hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeoHash(String);

impl GeoHash {
    /// Encode a coordinate with `precision` symbols.
    pub fn encode(coordinate: &Coordinate, precision: usize) -> Result<Self> {
        if !(1..=MAX_PRECISION).contains(&precision) {
            return Err(GeoliveError::InvalidPrecision(precision));
        }

        let (lat, lng) = (coordinate.latitude(), coordinate.longitude());
        let mut lng_range = Interval::LONGITUDE;
        let mut lat_range = Interval::LATITUDE;
        let mut hash = String::with_capacity(precision);

        for i in 0..precision {
            let mut value = 0u8;
            for j in 0..BITS_PER_CHAR as usize {
                let even = (i * BITS_PER_CHAR as usize + j) % 2 == 0;
                let range = if even { lng_range } else { lat_range };
                let upper = if even { lng } else { lat } > range.mid();
                value = (value << 1) | upper as u8;
                if even {
                    lng_range = range.bisect(upper);
                } else {
                    lat_range = range.bisect(upper);
                }
            }
            hash.push(value_to_char(value)?);
        }

        Ok(Self(hash))
    }

    /// Validate an existing hash string.
    pub fn parse(hash: impl Into<String>) -> Result<Self> {
        let hash = hash.into();
        if hash.is_empty() || hash.len() > MAX_PRECISION || !is_valid_hash(&hash) {
            return Err(GeoliveError::InvalidGeohash(hash));
        }
        Ok(Self(hash))
    }

    /// Center of the cell this hash names.
    pub fn decode(&self) -> Coordinate {
        let (lat_range, lng_range) = cell_of(&self.0);
        // The midpoint of a sub-interval of the valid ranges is always valid.
        Coordinate::new(lat_range.mid(), lng_range.mid())
            .unwrap_or_else(|_| unreachable!("cell center outside the valid range"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of symbols.
    #[inline]
    pub fn precision(&self) -> usize {
        self.0.len()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Narrow both ranges over every bit of an already-validated hash.
fn cell_of(hash: &str) -> (Interval, Interval) {
    let mut lng_range = Interval::LONGITUDE;
    let mut lat_range = Interval::LATITUDE;
    let mut bit_index = 0usize;

    for c in hash.chars() {
        let value = char_to_value(c).unwrap_or(0);
        for shift in (0..BITS_PER_CHAR).rev() {
            let upper = (value >> shift) & 1 == 1;
            if bit_index % 2 == 0 {
                lng_range = lng_range.bisect(upper);
            } else {
                lat_range = lat_range.bisect(upper);
            }
            bit_index += 1;
        }
    }

    (lat_range, lng_range)
}

/// Encode a coordinate with `precision` symbols.
pub fn encode(coordinate: &Coordinate, precision: usize) -> Result<GeoHash> {
    GeoHash::encode(coordinate, precision)
}

/// Decode a hash string to the center of its cell.
pub fn decode(hash: &str) -> Result<Coordinate> {
    Ok(GeoHash::parse(hash)?.decode())
}

/// Width (longitude degrees) and height (latitude degrees) of a cell named by
/// `bits` hash bits.
pub fn cell_size_degrees(bits: u32) -> (f64, f64) {
    let lng_bits = bits.div_ceil(2);
    let lat_bits = bits / 2;
    (
        360.0 / 2f64.powi(lng_bits as i32),
        180.0 / 2f64.powi(lat_bits as i32),
    )
}

impl fmt::Display for GeoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GeoHash {
    type Err = GeoliveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for GeoHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
