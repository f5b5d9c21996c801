//! Pure spatial computation: the hash codec, region sizing, range planning,
//! distance filtering and input validation.
//!
//! Nothing here touches a store; the query engine builds on these functions.

pub mod distance;
pub mod geohash;
pub mod planner;
pub mod sizing;
pub mod validation;
