//! Live geospatial region queries over a keyed record store.
//!
//! Records carry a spatial hash as their sort token, so a handful of token
//! ranges cover any circle on the map. A [`GeoQuery`] subscribes to those
//! ranges and reports keys entering, leaving and moving inside the circle.
//!
//! ```rust
//! use geolive::prelude::*;
//! use geolive::record::record_for;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let sf = Coordinate::new(37.7749, -122.4194)?;
//! let record = record_for(&sf, 10)?;
//! store.write("truck-1", Some(record.to_value()?), Some(&record.geohash), None);
//!
//! let query = GeoQuery::new(store.clone(), sf, 500.0)?;
//! # struct Noop;
//! # impl GeoQueryEventListener for Noop {}
//! query.add_key_listener(Arc::new(Noop))?;
//! query.wait_idle(Duration::from_secs(5));
//! assert_eq!(query.matched().len(), 1);
//! # Ok::<(), geolive::GeoliveError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod store;

pub use builder::GeoQueryBuilder;
pub use config::Config;
pub use error::{GeoliveError, Result};

pub use geolive_types::{Coordinate, CoordinateError, DistanceMetric, LocationRecord};

pub use compute::distance::{Region, distance_between};
pub use compute::geohash::{GeoHash, decode, encode};
pub use compute::planner::{RegionBound, bounds_for, hash_may_be_in_bounds};
pub use compute::sizing::bits_for_region;

pub use query::{
    EventFilter, EventKind, GeoQuery, GeoQueryDataEventListener, GeoQueryEventListener,
    ListenerId, QueryEvent, QueryListener,
};

pub use store::{
    MemoryStore, RangeHandle, RangeSink, RecordStore, Snapshot, StoreError, StoreNotification,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Config, GeoQuery, GeoQueryBuilder, GeoliveError, Result};

    pub use crate::{Coordinate, DistanceMetric};

    pub use crate::query::{
        EventFilter, EventKind, GeoQueryDataEventListener, GeoQueryEventListener, ListenerId,
    };

    pub use crate::store::{MemoryStore, RecordStore, Snapshot, StoreError};

    pub use std::time::Duration;
}
