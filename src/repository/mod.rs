//! Persistence of stations and observations.
//!
//! [`ObservationStore`] is the storage contract the pipeline depends on. Both writes
//! are idempotent: a key that already exists is left untouched and the write still
//! succeeds. Two `sqlx` backends implement it, [`PgRepository`] for a PostgreSQL
//! server and [`SqliteRepository`] for an embedded database.

pub mod error;
pub mod postgres;
pub mod sqlite;

pub use error::RepositoryError;
pub use postgres::PgRepository;
pub use sqlite::SqliteRepository;

use crate::config::DatabaseConfig;
use crate::types::observation::ObservationRow;
use crate::types::station::StationInfo;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Outcome of an idempotent write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Rows handed to the write.
    pub attempted: usize,
    /// Rows that did not exist before and were inserted.
    pub inserted: usize,
}

impl WriteOutcome {
    /// Rows skipped because their key was already present.
    pub fn ignored(&self) -> usize {
        self.attempted - self.inserted
    }
}

/// Storage for stations, observations and the windowed analytics over them.
///
/// Implementations hold a single connection; they are used sequentially by one
/// pipeline run.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Creates the `stations` and `observations` tables if they do not exist.
    async fn ensure_schema(&self) -> Result<(), RepositoryError>;

    /// Inserts the station unless a row with the same identifier exists.
    async fn upsert_station(&self, station: &StationInfo) -> Result<WriteOutcome, RepositoryError>;

    /// Inserts each row unless `(station_id, timestamp)` exists.
    ///
    /// The batch is one transaction: on any error nothing from it is kept.
    async fn upsert_observations(
        &self,
        station_id: &str,
        rows: &[ObservationRow],
    ) -> Result<WriteOutcome, RepositoryError>;

    /// Mean of non-null temperatures observed at or after `since`, `None` if there
    /// are none.
    async fn average_temperature(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, RepositoryError>;

    /// Largest absolute change in wind speed between consecutive observations at or
    /// after `since`. Pairs where either reading is null do not count.
    async fn max_wind_speed_delta(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, RepositoryError>;

    /// Loads a stored station, `None` if it was never inserted.
    async fn get_station(&self, station_id: &str) -> Result<Option<StationInfo>, RepositoryError>;

    async fn station_count(&self) -> Result<i64, RepositoryError>;

    async fn observation_count(&self, station_id: &str) -> Result<i64, RepositoryError>;

    /// Releases the connection. Further calls fail.
    async fn close(&self);
}

/// Opens the store described by `config`.
///
/// # Errors
///
/// [`RepositoryError::Connect`] if the database is unreachable. This is the one
/// failure a pipeline run cannot recover from.
pub async fn connect(
    config: &DatabaseConfig,
) -> Result<Box<dyn ObservationStore>, RepositoryError> {
    let store: Box<dyn ObservationStore> = match config {
        DatabaseConfig::Postgres(pg) => Box::new(PgRepository::connect(pg).await?),
        DatabaseConfig::Sqlite(sqlite) => Box::new(SqliteRepository::connect(sqlite).await?),
    };
    Ok(store)
}

type StationRecord = (
    String,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
);

pub(crate) fn station_from_record(record: StationRecord) -> StationInfo {
    let (station_id, name, timezone, latitude, longitude) = record;
    StationInfo {
        station_id,
        name,
        timezone,
        latitude,
        longitude,
    }
}

/// Oldest timestamp that still falls inside a window of `window_days` ending at `now`.
pub(crate) fn window_start(now: DateTime<Utc>, window_days: i64) -> DateTime<Utc> {
    now - Duration::days(window_days)
}
