use serde::{Deserialize, Serialize};

/// Distance model used to decide whether a coordinate lies inside a region.
///
/// - **Haversine**: spherical Earth, fast, the default
/// - **Geodesic**: ellipsoidal (Karney 2013), more accurate and slower
/// - **Rhumb**: constant-bearing distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Haversine,
    Geodesic,
    Rhumb,
}
