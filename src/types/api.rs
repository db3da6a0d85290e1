//! Wire envelopes for the GeoJSON documents returned by api.weather.gov.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A GeoJSON `FeatureCollection`. Only the features are of interest.
#[derive(Debug, Deserialize)]
pub(crate) struct FeatureCollection<T> {
    #[serde(default = "Vec::new")]
    pub features: Vec<Feature<T>>,
}

/// A GeoJSON `Feature`. Features without `properties` deserialise to `None`.
#[derive(Debug, Deserialize)]
pub(crate) struct Feature<T> {
    #[serde(default = "Option::default")]
    pub properties: Option<T>,
}

/// Response body of `/stations/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct StationDocument {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Geometry {
    /// `[longitude, latitude]`, possibly with nulls or missing entirely.
    #[serde(default)]
    pub coordinates: Option<Vec<Option<f64>>>,
}

/// `properties` of a feature in the `/stations` listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StationListingProperties {
    pub station_identifier: String,
    #[serde(default)]
    pub name: Option<String>,
}
