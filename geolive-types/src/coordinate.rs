use serde::{Deserialize, Serialize};

/// Error returned when a latitude/longitude pair is not a valid geographic
/// coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateError {
    /// Latitude is NaN, infinite, or outside [-90, 90]
    InvalidLatitude(f64),
    /// Longitude is NaN, infinite, or outside [-180, 180]
    InvalidLongitude(f64),
}

impl std::fmt::Display for CoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLatitude(lat) => {
                write!(f, "Latitude out of range [-90.0, 90.0]: {}", lat)
            }
            Self::InvalidLongitude(lng) => {
                write!(f, "Longitude out of range [-180.0, 180.0]: {}", lng)
            }
        }
    }
}

impl std::error::Error for CoordinateError {}

/// A validated geographic coordinate.
///
/// Latitude is always in [-90, 90] and longitude in [-180, 180]; the only way
/// to build one is through [`Coordinate::new`], which rejects NaN and
/// out-of-range values.
///
/// # Examples
///
/// ```
/// use geolive_types::coordinate::Coordinate;
///
/// let nyc = Coordinate::new(40.7128, -74.0060).unwrap();
/// assert_eq!(nyc.latitude(), 40.7128);
///
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// assert!(Coordinate::new(0.0, f64::NAN).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, validating both components.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Check whether a latitude/longitude pair would form a valid coordinate.
    #[inline]
    pub fn is_valid(latitude: f64, longitude: f64) -> bool {
        (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Convert to a `geo::Point` (x = longitude, y = latitude).
    #[inline]
    pub fn to_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

impl TryFrom<[f64; 2]> for Coordinate {
    type Error = CoordinateError;

    fn try_from(value: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1])
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(value: Coordinate) -> Self {
        [value.latitude, value.longitude]
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(value: Coordinate) -> Self {
        value.to_point()
    }
}
