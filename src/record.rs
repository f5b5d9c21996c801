//! Reading and building stored location records.
//!
//! A record is stored as `{ "g": <hash>, "l": [lat, lng], ... }`. Only `l` is
//! needed to locate a key; `g` doubles as the store's sort token.

use crate::compute::geohash::GeoHash;
use crate::compute::validation::validate_precision;
use crate::error::{GeoliveError, Result};
use crate::store::Snapshot;
use geolive_types::{Coordinate, LocationRecord};
use serde::Deserialize;
use serde_json::Value;

/// The part of a stored record the engine reads. Other fields, `g` included,
/// are ignored.
#[derive(Deserialize)]
struct StoredLocation {
    l: Coordinate,
}

/// Parse the coordinate stored in `value`.
///
/// The value must be an object whose `l` field is a two-element array of
/// numbers forming a valid coordinate.
pub fn parse_location(value: &Value) -> std::result::Result<Coordinate, String> {
    StoredLocation::deserialize(value)
        .map(|stored| stored.l)
        .map_err(|e| e.to_string())
}

/// The coordinate stored in a snapshot.
///
/// A missing value is `Ok(None)`; a value that is present but malformed is
/// an [`GeoliveError::InvalidRecord`].
///
/// ```rust
/// use geolive::record::location_from_snapshot;
/// use geolive::store::Snapshot;
/// use serde_json::{json, Value};
///
/// let snapshot = Snapshot::new("truck-1", json!({ "g": "9q8yy", "l": [37.77, -122.41] }));
/// let location = location_from_snapshot(&snapshot).unwrap().unwrap();
/// assert_eq!(location.latitude(), 37.77);
///
/// assert!(location_from_snapshot(&Snapshot::new("gone", Value::Null)).unwrap().is_none());
/// assert!(location_from_snapshot(&Snapshot::new("bad", json!({ "l": "x" }))).is_err());
/// ```
pub fn location_from_snapshot(snapshot: &Snapshot) -> Result<Option<Coordinate>> {
    if !snapshot.exists() {
        return Ok(None);
    }
    parse_location(&snapshot.value)
        .map(Some)
        .map_err(|reason| GeoliveError::InvalidRecord {
            key: snapshot.key.clone(),
            reason,
        })
}

/// Build the record stored for `coordinate`, hashed with `precision` symbols.
pub fn record_for(coordinate: &Coordinate, precision: usize) -> Result<LocationRecord> {
    let hash = GeoHash::encode(coordinate, validate_precision(precision)?)?;
    Ok(LocationRecord::new(hash.into_string(), *coordinate))
}
