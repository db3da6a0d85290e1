//! Turns raw API observations into typed rows.
//!
//! The timestamp is the only required field. Each metric is extracted on its own and
//! degrades to `None` when it is absent, null, non-numeric or non-finite, so one bad
//! field never costs the whole record.

use crate::types::observation::{ObservationRow, RawObservation};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Observation has no timestamp")]
    MissingTimestamp,

    #[error("Observation timestamp '{value}' is not valid RFC 3339")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Observation timestamp has unexpected type: {0}")]
    UnexpectedTimestampType(String),
}

/// Result of normalising a batch: the usable rows plus a count of skipped records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub rows: Vec<ObservationRow>,
    pub malformed: usize,
}

/// Rounds to two decimal places.
///
/// The exact binary value is rounded, with exact ties going to the even digit, so
/// `0.125` becomes `0.12` and `0.375` becomes `0.38`. Values too large to carry a
/// fractional part come back unchanged.
pub fn round_value(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

/// Normalises a single observation.
///
/// # Errors
///
/// Fails only when the timestamp is missing or unparseable. Metric problems never
/// produce an error.
pub fn normalize(raw: &RawObservation) -> Result<ObservationRow, NormalizeError> {
    let timestamp = parse_timestamp(raw.timestamp.as_ref())?;
    Ok(ObservationRow {
        timestamp,
        temperature: measurement(raw.temperature.as_ref()),
        wind_speed: measurement(raw.wind_speed.as_ref()),
        humidity: measurement(raw.relative_humidity.as_ref()),
    })
}

/// Normalises every record, skipping (and counting) the ones that fail.
pub fn normalize_batch(raws: &[RawObservation]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        rows: Vec::with_capacity(raws.len()),
        malformed: 0,
    };
    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw) {
            Ok(row) => {
                debug!(
                    "Observation: timestamp {}, temperature {:?}, wind {:?}, humidity {:?}",
                    row.timestamp, row.temperature, row.wind_speed, row.humidity
                );
                batch.rows.push(row);
            }
            Err(e) => {
                warn!("Skipping observation #{}: {}", index, e);
                batch.malformed += 1;
            }
        }
    }
    batch
}

fn parse_timestamp(value: Option<&Value>) -> Result<DateTime<Utc>, NormalizeError> {
    let text = match value {
        None | Some(Value::Null) => return Err(NormalizeError::MissingTimestamp),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(NormalizeError::MissingTimestamp)
        }
        Some(Value::String(s)) => s.trim(),
        Some(other) => return Err(NormalizeError::UnexpectedTimestampType(other.to_string())),
    };
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| NormalizeError::InvalidTimestamp {
            value: text.to_string(),
            source,
        })
}

/// Reads `{ "value": ... }` out of a quantitative value object.
fn measurement(field: Option<&Value>) -> Option<f64> {
    let value = field?.as_object()?.get("value")?;
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(round_value(number)).filter(|v| v.is_finite())
}
