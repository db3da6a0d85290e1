//! Defines the data structures representing api.weather.gov observation stations,
//! both the stored metadata row and the lightweight summary returned by the
//! station listing endpoint.

use serde::{Deserialize, Serialize};

// --- Data Structures ---

/// Metadata for a single weather station, as persisted in the `stations` table.
///
/// Built from the `/stations/{id}` response. The provider reports coordinates as
/// `[longitude, latitude]`; by the time they land here the axes are already swapped
/// into their named fields.
///
/// Rows are written once and never updated, so the first successful fetch wins.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationInfo {
    /// The station identifier (e.g., "032HE", "KBOS"). Primary key.
    pub station_id: String,
    /// Human-readable station name, if reported.
    pub name: Option<String>,
    /// The IANA timezone name for the station (e.g., "America/Chicago"), if reported.
    pub timezone: Option<String>,
    /// Latitude in decimal degrees, or `None` when the provider omitted coordinates.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees, or `None` when the provider omitted coordinates.
    pub longitude: Option<f64>,
}

impl StationInfo {
    /// Returns `true` when both coordinates are known.
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// A station entry from the `/stations` listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationSummary {
    pub station_id: String,
    pub name: Option<String>,
}
