//! Provides the `StationClient`, a thin async wrapper around the api.weather.gov
//! station endpoints.
//!
//! Every request carries the configured `User-Agent` (the API rejects anonymous
//! clients) and is bounded by the configured timeout. Only HTTP 200 counts as
//! success; anything else is surfaced as [`ClientError::HttpStatus`] so the caller
//! can log it and carry on.

use crate::client::error::ClientError;
use crate::config::ClientConfig;
use crate::types::api::{FeatureCollection, StationDocument, StationListingProperties};
use crate::types::observation::RawObservation;
use crate::types::station::{StationInfo, StationSummary};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

const GEO_JSON: &str = "application/geo+json";

/// Async client for station metadata and observations.
#[derive(Debug, Clone)]
pub struct StationClient {
    http: Client,
    base_url: String,
}

impl StationClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the underlying `reqwest` client cannot be
    /// constructed (for example when the TLS backend fails to initialise).
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches metadata for a single station.
    ///
    /// Returns `Ok(None)` when the response carries no (or empty) `properties`.
    /// Missing coordinates are tolerated and leave `latitude`/`longitude` unset.
    ///
    /// # Errors
    ///
    /// [`ClientError::HttpStatus`] for any non-200 response, plus the transport and
    /// decoding variants.
    pub async fn fetch_station_info(
        &self,
        station_id: &str,
    ) -> Result<Option<StationInfo>, ClientError> {
        let url = format!("{}/stations/{}", self.base_url, station_id);
        let document: StationDocument = self.get_json(&url, &[]).await?;
        let station = station_from_document(station_id, document);
        match &station {
            None => warn!("No properties found for station {}", station_id),
            Some(s) if !s.has_coordinates() => {
                warn!("Coordinates not available for station {}", station_id)
            }
            Some(_) => {}
        }
        Ok(station)
    }

    /// Fetches all observations between `start` and `end`, returning an empty list on
    /// any failure.
    ///
    /// Empty results are a normal outcome for this API (short retention, quiet
    /// stations), so failures are logged rather than returned. Use
    /// [`StationClient::try_fetch_observations`] to see the error.
    pub async fn fetch_observations(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<RawObservation> {
        match self.try_fetch_observations(station_id, start, end).await {
            Ok(observations) => observations,
            Err(e) => {
                match e.status() {
                    Some(status) => warn!("Failed to fetch observations: {}", status.as_u16()),
                    None => warn!("Failed to fetch observations: {}", e),
                }
                Vec::new()
            }
        }
    }

    /// Fetches all observations between `start` and `end`.
    ///
    /// Features whose `properties` are missing or not an object are kept as empty
    /// records so that the normaliser can count them as malformed.
    pub async fn try_fetch_observations(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawObservation>, ClientError> {
        let url = format!("{}/stations/{}/observations", self.base_url, station_id);
        let query = [
            ("start", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        let collection: FeatureCollection<Value> = self.get_json(&url, &query).await?;
        let observations: Vec<RawObservation> = collection
            .features
            .into_iter()
            .map(|feature| raw_observation(feature.properties))
            .collect();
        info!(
            "Observations fetched for {}: {} entries",
            station_id,
            observations.len()
        );
        Ok(observations)
    }

    /// Lists the stations on the first page of `/stations`.
    pub async fn list_stations(&self) -> Result<Vec<StationSummary>, ClientError> {
        let url = format!("{}/stations", self.base_url);
        let collection: FeatureCollection<StationListingProperties> =
            self.get_json(&url, &[]).await?;
        Ok(collection
            .features
            .into_iter()
            .filter_map(|feature| feature.properties)
            .map(|props| StationSummary {
                station_id: props.station_identifier,
                name: props.name,
            })
            .collect())
    }

    /// Checks whether the station currently reports a latest observation.
    pub async fn has_latest_observation(&self, station_id: &str) -> Result<bool, ClientError> {
        let url = format!(
            "{}/stations/{}/observations/latest",
            self.base_url, station_id
        );
        let body: Value = self.get_json(&url, &[]).await?;
        Ok(body.get("properties").is_some_and(Value::is_object))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(url)
            .header(ACCEPT, GEO_JSON)
            .query(query)
            .send()
            .await
            .map_err(|e| ClientError::NetworkRequest(url.to_string(), e))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("HTTP error for {}: {}", url, status);
            return Err(ClientError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(url.to_string(), e))
    }
}

/// Computes the `[start, end]` range requested from the observations endpoint.
pub fn observation_window(
    now: DateTime<Utc>,
    lookback_days: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - Duration::days(lookback_days), now)
}

fn raw_observation(properties: Option<Value>) -> RawObservation {
    match properties {
        Some(properties @ Value::Object(_)) => {
            serde_json::from_value(properties).unwrap_or_default()
        }
        Some(other) => {
            debug!("Observation properties are not an object: {}", other);
            RawObservation::default()
        }
        None => RawObservation::default(),
    }
}

fn station_from_document(station_id: &str, document: StationDocument) -> Option<StationInfo> {
    let properties = document.properties.filter(|p| !p.is_empty())?;
    let text = |key: &str| {
        properties
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    // GeoJSON order is [longitude, latitude].
    let coordinates = document
        .geometry
        .and_then(|g| g.coordinates)
        .unwrap_or_default();
    let longitude = coordinates.first().copied().flatten();
    let latitude = coordinates.get(1).copied().flatten();

    Some(StationInfo {
        station_id: station_id.to_string(),
        name: text("name"),
        timezone: text("timeZone"),
        latitude,
        longitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn document(value: Value) -> StationDocument {
        serde_json::from_value(value).expect("valid station document")
    }

    #[test]
    fn test_coordinates_are_swapped_into_lat_lon() {
        let doc = document(json!({
            "properties": { "name": "Norman Mesonet", "timeZone": "America/Chicago" },
            "geometry": { "type": "Point", "coordinates": [-97.5, 35.2] }
        }));
        let station = station_from_document("032HE", doc).unwrap();
        assert_eq!(station.station_id, "032HE");
        assert_eq!(station.name.as_deref(), Some("Norman Mesonet"));
        assert_eq!(station.timezone.as_deref(), Some("America/Chicago"));
        assert_eq!(station.latitude, Some(35.2));
        assert_eq!(station.longitude, Some(-97.5));
    }

    #[test]
    fn test_missing_geometry_leaves_coordinates_empty() {
        let doc = document(json!({ "properties": { "name": "No Geo" } }));
        let station = station_from_document("X1", doc).unwrap();
        assert_eq!(station.latitude, None);
        assert_eq!(station.longitude, None);
        assert_eq!(station.timezone, None);
    }

    #[test]
    fn test_null_coordinates_are_tolerated() {
        let doc = document(json!({
            "properties": { "name": "Half" },
            "geometry": { "coordinates": [null, 40.1] }
        }));
        let station = station_from_document("X2", doc).unwrap();
        assert_eq!(station.longitude, None);
        assert_eq!(station.latitude, Some(40.1));
    }

    #[test]
    fn test_empty_properties_is_not_found() {
        assert!(station_from_document("X3", document(json!({ "properties": {} }))).is_none());
        assert!(station_from_document("X3", document(json!({}))).is_none());
    }

    #[test]
    fn test_unreadable_observation_properties_become_empty() {
        let empty = RawObservation::default();
        assert_eq!(raw_observation(Some(json!("junk"))), empty);
        assert_eq!(raw_observation(Some(json!([1, 2]))), empty);
        assert_eq!(raw_observation(None), empty);

        let raw = raw_observation(Some(json!({ "timestamp": "2024-09-30T18:55:00Z" })));
        assert_eq!(raw.timestamp, Some(json!("2024-09-30T18:55:00Z")));
    }

    #[test]
    fn test_observation_window_spans_lookback() {
        let now = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
        let (start, end) = observation_window(now, 3650);
        assert_eq!(end, now);
        assert_eq!((end - start).num_days(), 3650);
    }
}
