//! Error types for geolive.

use crate::store::StoreError;
use geolive_types::CoordinateError;
use thiserror::Error;

/// Errors raised by the codec, the planner and the live query engine.
#[derive(Error, Debug)]
pub enum GeoliveError {
    /// Generic validation failure.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Latitude/longitude outside the valid range.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordinateError),

    /// Empty hash or a character outside the base-32 alphabet.
    #[error("Invalid geohash: {0:?}")]
    InvalidGeohash(String),

    /// Hash precision outside 1..=22.
    #[error("Invalid geohash precision {0}: must be between 1 and 22")]
    InvalidPrecision(usize),

    /// Radius that is negative, NaN or infinite.
    #[error("Invalid radius {0}: must be a finite, non-negative number of meters")]
    InvalidRadius(f64),

    /// A stored record that does not parse into a location.
    #[error("Invalid location record for key {key:?}: {reason}")]
    InvalidRecord { key: String, reason: String },

    /// Error surfaced by the record store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The same listener instance was attached twice.
    #[error("Listener is already attached to this query")]
    DuplicateListener,

    /// The query engine has been shut down.
    #[error("Query engine is closed")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),

    /// A record that could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for geolive operations.
pub type Result<T> = std::result::Result<T, GeoliveError>;
