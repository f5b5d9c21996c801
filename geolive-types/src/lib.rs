//! # geolive-types
//!
//! Plain data types shared between the `geolive` query engine and the record
//! stores it subscribes to:
//!
//! - **Coordinates**: `Coordinate`, a validated latitude/longitude pair
//! - **Records**: `LocationRecord`, the `{ "g": hash, "l": [lat, lng] }` shape
//!   written next to every tracked key
//! - **Metrics**: `DistanceMetric`, the exact-distance model used for region
//!   membership
//!
//! All types are serializable with Serde and convert into the `geo` crate's
//! primitives.
//!
//! ## Examples
//!
//! ```rust
//! use geolive_types::coordinate::Coordinate;
//! use geolive_types::record::LocationRecord;
//!
//! let sf = Coordinate::new(37.7749, -122.4194).unwrap();
//! let record = LocationRecord::new("9q8yyk8ytp", sf);
//! assert_eq!(record.coordinate(), Some(sf));
//! ```

pub mod coordinate;
pub mod metric;
pub mod record;

pub use coordinate::{Coordinate, CoordinateError};
pub use metric::DistanceMetric;
pub use record::LocationRecord;
