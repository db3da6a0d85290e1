//! Read-side analytics over persisted observations.

use crate::repository::{window_start, ObservationStore, RepositoryError};
use chrono::{DateTime, Utc};
use std::fmt;

/// A computed metric, or the explicit absence of one.
///
/// `NoData` means no qualifying observations were found. It is distinct from
/// `Value(0.0)`, which means the observations really did average out to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Value(f64),
    NoData,
}

impl Aggregate {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Aggregate::NoData)
    }
}

impl From<Option<f64>> for Aggregate {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Aggregate::NoData, Aggregate::Value)
    }
}

/// Both metrics for one station over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsReport {
    pub window_days: i64,
    pub average_temperature: Aggregate,
    pub max_wind_speed_delta: Aggregate,
}

impl fmt::Display for AnalyticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average_temperature {
            Aggregate::Value(v) => writeln!(
                f,
                "Average temperature for the last {} days: {:.2}°C",
                self.window_days, v
            )?,
            Aggregate::NoData => writeln!(f, "No temperature data available.")?,
        }
        match self.max_wind_speed_delta {
            Aggregate::Value(v) => write!(
                f,
                "Maximum wind speed change in the last {} days: {:.2} km/h",
                self.window_days, v
            ),
            Aggregate::NoData => write!(f, "No wind speed data available."),
        }
    }
}

/// Runs the windowed analytic queries against a store.
///
/// The window covers the `window_days` days that end at the instant passed to
/// each query.
pub struct Aggregator<'a> {
    store: &'a dyn ObservationStore,
    window_days: i64,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a dyn ObservationStore, window_days: i64) -> Self {
        Self { store, window_days }
    }

    pub async fn average_temperature(
        &self,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Aggregate, RepositoryError> {
        let since = window_start(now, self.window_days);
        let average = self.store.average_temperature(station_id, since).await?;
        Ok(average.into())
    }

    pub async fn max_wind_speed_delta(
        &self,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Aggregate, RepositoryError> {
        let since = window_start(now, self.window_days);
        let delta = self.store.max_wind_speed_delta(station_id, since).await?;
        Ok(delta.into())
    }

    /// Computes both metrics for the window ending at `now`.
    pub async fn report(
        &self,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, RepositoryError> {
        Ok(AnalyticsReport {
            window_days: self.window_days,
            average_temperature: self.average_temperature(station_id, now).await?,
            max_wind_speed_delta: self.max_wind_speed_delta(station_id, now).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SqliteRepository;
    use crate::types::observation::ObservationRow;
    use crate::types::station::StationInfo;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_no_data_is_not_zero() {
        assert_eq!(Aggregate::from(None), Aggregate::NoData);
        assert_eq!(Aggregate::from(Some(0.0)), Aggregate::Value(0.0));
        assert_ne!(Aggregate::NoData, Aggregate::Value(0.0));
        assert!(Aggregate::NoData.is_no_data());
    }

    #[test]
    fn test_report_display() {
        let report = AnalyticsReport {
            window_days: 7,
            average_temperature: Aggregate::Value(15.0),
            max_wind_speed_delta: Aggregate::Value(6.0),
        };
        assert_eq!(
            report.to_string(),
            "Average temperature for the last 7 days: 15.00°C\n\
             Maximum wind speed change in the last 7 days: 6.00 km/h"
        );

        let empty = AnalyticsReport {
            window_days: 7,
            average_temperature: Aggregate::NoData,
            max_wind_speed_delta: Aggregate::NoData,
        };
        assert_eq!(
            empty.to_string(),
            "No temperature data available.\nNo wind speed data available."
        );
    }

    #[tokio::test]
    async fn test_report_from_store() -> Result<(), RepositoryError> {
        let store = SqliteRepository::in_memory().await?;
        store.ensure_schema().await?;
        store
            .upsert_station(&StationInfo {
                station_id: "032HE".to_string(),
                name: None,
                timezone: None,
                latitude: None,
                longitude: None,
            })
            .await?;

        let now = Utc::now();
        let rows: Vec<ObservationRow> = [(3, 5.0), (2, 9.0), (1, 3.0)]
            .into_iter()
            .map(|(days, wind)| ObservationRow {
                timestamp: now - Duration::days(days),
                temperature: Some(10.0 * days as f64),
                wind_speed: Some(wind),
                humidity: None,
            })
            .collect();
        store.upsert_observations("032HE", &rows).await?;

        let aggregator = Aggregator::new(&store, 7);
        let report = aggregator.report("032HE", now).await?;
        assert_eq!(report.average_temperature, Aggregate::Value(20.0));
        assert_eq!(report.max_wind_speed_delta, Aggregate::Value(6.0));

        let other = aggregator.report("KBOS", now).await?;
        assert!(other.average_temperature.is_no_data());
        assert!(other.max_wind_speed_delta.is_no_data());
        Ok(())
    }

    #[tokio::test]
    async fn test_report_uses_given_window_end() -> Result<(), RepositoryError> {
        let store = SqliteRepository::in_memory().await?;
        store.ensure_schema().await?;
        store
            .upsert_station(&StationInfo {
                station_id: "032HE".to_string(),
                name: None,
                timezone: None,
                latitude: None,
                longitude: None,
            })
            .await?;

        let end = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        let rows = vec![
            ObservationRow {
                timestamp: Utc.with_ymd_and_hms(2024, 9, 30, 0, 0, 0).unwrap(),
                temperature: Some(10.0),
                wind_speed: Some(4.0),
                humidity: None,
            },
            ObservationRow {
                timestamp: Utc.with_ymd_and_hms(2024, 9, 30, 6, 0, 0).unwrap(),
                temperature: None,
                wind_speed: Some(6.5),
                humidity: None,
            },
        ];
        store.upsert_observations("032HE", &rows).await?;

        let aggregator = Aggregator::new(&store, 7);
        let report = aggregator.report("032HE", end).await?;
        assert_eq!(report.average_temperature, Aggregate::Value(10.0));
        assert_eq!(report.max_wind_speed_delta, Aggregate::Value(2.5));

        // The same rows are long outside a window ending today.
        let current = aggregator.report("032HE", Utc::now()).await?;
        assert!(current.average_temperature.is_no_data());
        Ok(())
    }
}
