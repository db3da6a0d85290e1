//! Observation records in their two shapes: the loosely typed record as the API
//! sends it, and the normalised row that gets persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observation exactly as found under `features[].properties`.
///
/// Every field is kept as a raw [`Value`] so that a single malformed field never
/// fails deserialisation of the whole collection. Interpretation happens in
/// [`crate::normalize`].
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    /// ISO 8601 timestamp string. Required for the record to be usable.
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// Quantitative value object, `{ "value": ..., "unitCode": "wmoUnit:degC" }`.
    #[serde(default)]
    pub temperature: Option<Value>,
    /// Quantitative value object in km/h.
    #[serde(default)]
    pub wind_speed: Option<Value>,
    /// Quantitative value object in percent.
    #[serde(default)]
    pub relative_humidity: Option<Value>,
}

/// A normalised observation, ready for insertion into the `observations` table.
///
/// Metrics are rounded to two decimal places. `None` means the reading was missing
/// or unusable upstream; it is never substituted with zero.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ObservationRow {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub humidity: Option<f64>,
}
