//! Query engine configuration.
//!
//! ```rust
//! use geolive::Config;
//! use geolive::DistanceMetric;
//!
//! let json = r#"{ "distance_metric": "geodesic", "confirm_removals": false }"#;
//! let config = Config::from_json(json).unwrap();
//! assert_eq!(config.distance_metric, DistanceMetric::Geodesic);
//! assert_eq!(config.geohash_precision, 10);
//! ```

use crate::compute::geohash::{DEFAULT_PRECISION, MAX_PRECISION};
use crate::compute::sizing::MAX_SUPPORTED_RADIUS;
use geolive_types::DistanceMetric;
use serde::de::Error;

/// Settings for a [`GeoQuery`](crate::GeoQuery).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Precision (in symbols) of the hashes built by [`record_for`](crate::record::record_for)
    #[serde(default = "Config::default_geohash_precision")]
    pub geohash_precision: usize,

    /// Metric used for the exact region-membership test
    #[serde(default)]
    pub distance_metric: DistanceMetric,

    /// Radii above this are capped
    #[serde(default = "Config::default_max_radius")]
    pub max_radius_meters: f64,

    /// Confirm with a point read before exiting a key that left its last
    /// subscription, so hops between neighbouring ranges surface as moves
    #[serde(default = "Config::default_confirm_removals")]
    pub confirm_removals: bool,

    /// Name of the worker thread that serializes query processing
    #[serde(default = "Config::default_worker_name")]
    pub worker_name: String,
}

impl Config {
    const fn default_geohash_precision() -> usize {
        DEFAULT_PRECISION
    }

    const fn default_max_radius() -> f64 {
        MAX_SUPPORTED_RADIUS
    }

    const fn default_confirm_removals() -> bool {
        true
    }

    fn default_worker_name() -> String {
        "geolive-query".to_string()
    }

    pub fn with_geohash_precision(mut self, precision: usize) -> Self {
        assert!(
            (1..=MAX_PRECISION).contains(&precision),
            "Geohash precision must be between 1 and 22"
        );
        self.geohash_precision = precision;
        self
    }

    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    pub fn with_max_radius(mut self, meters: f64) -> Self {
        assert!(
            meters.is_finite() && meters > 0.0,
            "Maximum radius must be a positive, finite number of meters"
        );
        if meters > MAX_SUPPORTED_RADIUS {
            log::warn!(
                "Maximum radius {} exceeds the supported {} meters; queries may miss records",
                meters,
                MAX_SUPPORTED_RADIUS
            );
        }
        self.max_radius_meters = meters;
        self
    }

    pub fn with_confirm_removals(mut self, confirm: bool) -> Self {
        self.confirm_removals = confirm;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_PRECISION).contains(&self.geohash_precision) {
            return Err(format!(
                "Geohash precision must be between 1 and {}, got {}",
                MAX_PRECISION, self.geohash_precision
            ));
        }

        if !self.max_radius_meters.is_finite() || self.max_radius_meters <= 0.0 {
            return Err("Maximum radius must be a positive, finite number of meters".to_string());
        }

        if self.worker_name.is_empty() {
            return Err("Worker name cannot be empty".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geohash_precision: Self::default_geohash_precision(),
            distance_metric: DistanceMetric::default(),
            max_radius_meters: Self::default_max_radius(),
            confirm_removals: Self::default_confirm_removals(),
            worker_name: Self::default_worker_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.geohash_precision, 10);
        assert_eq!(config.distance_metric, DistanceMetric::Haversine);
        assert_eq!(config.max_radius_meters, 8_587_000.0);
        assert!(config.confirm_removals);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_geohash_precision(12)
            .with_distance_metric(DistanceMetric::Rhumb)
            .with_confirm_removals(false)
            .with_worker_name("fleet-query");

        let json = config.to_json().unwrap();
        let deserialized = Config::from_json(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(Config::from_json(r#"{ "sync_policy": "always" }"#).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::from_json(r#"{ "geohash_precision": 0 }"#).is_err());
        assert!(Config::from_json(r#"{ "geohash_precision": 23 }"#).is_err());
        assert!(Config::from_json(r#"{ "max_radius_meters": -1.0 }"#).is_err());
        assert!(Config::from_json(r#"{ "worker_name": "" }"#).is_err());
    }

    #[test]
    #[should_panic(expected = "Geohash precision must be between 1 and 22")]
    fn test_with_geohash_precision_panics_out_of_range() {
        let _ = Config::default().with_geohash_precision(30);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default().with_distance_metric(DistanceMetric::Geodesic);
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
