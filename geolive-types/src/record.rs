//! The stored shape of a tracked location.

use crate::coordinate::Coordinate;
use serde::{Deserialize, Serialize};

/// A location record as written next to a key: the spatial hash under `g`
/// (also used as the store's sort token) and `[latitude, longitude]` under
/// `l`.
///
/// Stores may keep additional fields beside these two; they are carried in
/// snapshots but never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(rename = "g")]
    pub geohash: String,
    #[serde(rename = "l")]
    pub location: [f64; 2],
}

impl LocationRecord {
    pub fn new(geohash: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            geohash: geohash.into(),
            location: coordinate.into(),
        }
    }

    /// The stored coordinate, or `None` when the pair is out of range.
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.location[0], self.location[1]).ok()
    }

    /// JSON value for this record, suitable for a store write.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        let record = LocationRecord::new("9q8yyk8ytp", Coordinate::new(37.7749, -122.4194).unwrap());
        let value = record.to_value().unwrap();
        assert_eq!(value["g"], "9q8yyk8ytp");
        assert_eq!(value["l"][0], 37.7749);
        assert_eq!(value["l"][1], -122.4194);

        let parsed: LocationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_out_of_range_location_has_no_coordinate() {
        let record = LocationRecord {
            geohash: "zzzz".into(),
            location: [120.0, 0.0],
        };
        assert!(record.coordinate().is_none());
    }
}
