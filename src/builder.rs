//! Query builder for flexible configuration
//!
//! This module provides a builder pattern for creating live queries with
//! a custom region, distance metric and engine settings.

use crate::config::Config;
use crate::error::{GeoliveError, Result};
use crate::query::GeoQuery;
use crate::store::RecordStore;
use geolive_types::{Coordinate, DistanceMetric};
use std::sync::Arc;

/// Builder for a [`GeoQuery`].
///
/// ```rust
/// use geolive::{Coordinate, DistanceMetric, GeoQuery};
/// use geolive::store::MemoryStore;
/// use std::sync::Arc;
///
/// let query = GeoQuery::builder(Arc::new(MemoryStore::new()))
///     .center(Coordinate::new(51.5072, -0.1276).unwrap())
///     .radius(2_500.0)
///     .distance_metric(DistanceMetric::Geodesic)
///     .build()
///     .unwrap();
/// assert_eq!(query.radius(), 2_500.0);
/// ```
pub struct GeoQueryBuilder {
    store: Arc<dyn RecordStore>,
    center: Option<Coordinate>,
    radius: f64,
    config: Config,
}

impl GeoQueryBuilder {
    /// Create a builder with the default configuration and a zero radius.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            center: None,
            radius: 0.0,
            config: Config::default(),
        }
    }

    pub fn center(mut self, center: Coordinate) -> Self {
        self.center = Some(center);
        self
    }

    /// Radius in meters.
    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the engine configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.config = self.config.with_distance_metric(metric);
        self
    }

    /// Precision of the hashes stored next to each record.
    pub fn geohash_precision(mut self, precision: usize) -> Self {
        self.config.geohash_precision = precision;
        self
    }

    pub fn confirm_removals(mut self, confirm: bool) -> Self {
        self.config = self.config.with_confirm_removals(confirm);
        self
    }

    /// Build the query and start its worker. Fails without a center, or when
    /// the radius or configuration is invalid.
    pub fn build(self) -> Result<GeoQuery> {
        let center = self
            .center
            .ok_or_else(|| GeoliveError::InvalidInput("Query center is required".to_string()))?;
        GeoQuery::with_config(self.store, center, self.radius, self.config)
    }
}

impl std::fmt::Debug for GeoQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoQueryBuilder")
            .field("center", &self.center)
            .field("radius", &self.radius)
            .field("config", &self.config)
            .finish()
    }
}
