//! Embedded SQLite backend, for running without a database server.
//!
//! Timestamps are stored as RFC 3339 text in UTC, which sorts and compares in
//! chronological order. Foreign keys are switched on for every connection.

use crate::config::SqliteConfig;
use crate::repository::error::RepositoryError;
use crate::repository::{station_from_record, ObservationStore, WriteOutcome};
use crate::types::observation::ObservationRow;
use crate::types::station::StationInfo;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS stations (
        station_id TEXT PRIMARY KEY,
        name TEXT,
        timezone TEXT,
        latitude REAL,
        longitude REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS observations (
        station_id TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        temperature REAL,
        wind_speed REAL,
        humidity REAL,
        PRIMARY KEY (station_id, timestamp),
        FOREIGN KEY (station_id) REFERENCES stations (station_id)
    )
    "#,
];

const INSERT_STATION: &str = r#"
    INSERT INTO stations (station_id, name, timezone, latitude, longitude)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT (station_id) DO NOTHING
"#;

const INSERT_OBSERVATION: &str = r#"
    INSERT INTO observations (station_id, timestamp, temperature, wind_speed, humidity)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT (station_id, timestamp) DO NOTHING
"#;

const SELECT_STATION: &str = r#"
    SELECT station_id, name, timezone, latitude, longitude
    FROM stations
    WHERE station_id = ?
"#;

const AVERAGE_TEMPERATURE: &str = r#"
    SELECT AVG(temperature)
    FROM observations
    WHERE station_id = ?
      AND timestamp >= ?
"#;

const MAX_WIND_SPEED_DELTA: &str = r#"
    WITH wind_speed_changes AS (
        SELECT wind_speed,
               LAG(wind_speed) OVER (ORDER BY timestamp) AS previous_wind_speed
        FROM observations
        WHERE station_id = ?
          AND timestamp >= ?
    )
    SELECT MAX(ABS(wind_speed - previous_wind_speed))
    FROM wind_speed_changes
    WHERE previous_wind_speed IS NOT NULL
"#;

/// Stores stations and observations in a SQLite file (or in memory).
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn connect(config: &SqliteConfig) -> Result<Self, RepositoryError> {
        let options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(RepositoryError::Connect)?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
        };
        let options = options.foreign_keys(true);

        // An in-memory database lives exactly as long as its connection, so the one
        // connection must never be recycled.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(RepositoryError::Connect)?;
        info!("Opened SQLite database at {}", config.path.display());
        Ok(Self { pool })
    }

    /// Shorthand for a fresh in-memory database.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        Self::connect(&SqliteConfig::in_memory()).await
    }
}

#[async_trait]
impl ObservationStore for SqliteRepository {
    async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::Schema)?;
        }
        Ok(())
    }

    async fn upsert_station(
        &self,
        station: &StationInfo,
    ) -> Result<WriteOutcome, RepositoryError> {
        let result = sqlx::query(INSERT_STATION)
            .bind(&station.station_id)
            .bind(&station.name)
            .bind(&station.timezone)
            .bind(station.latitude)
            .bind(station.longitude)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::query("insert station"))?;
        Ok(WriteOutcome {
            attempted: 1,
            inserted: result.rows_affected() as usize,
        })
    }

    async fn upsert_observations(
        &self,
        station_id: &str,
        rows: &[ObservationRow],
    ) -> Result<WriteOutcome, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(RepositoryError::Transaction)?;
        let mut inserted = 0;
        for row in rows {
            let result = sqlx::query(INSERT_OBSERVATION)
                .bind(station_id)
                .bind(row.timestamp)
                .bind(row.temperature)
                .bind(row.wind_speed)
                .bind(row.humidity)
                .execute(&mut *tx)
                .await
                .map_err(RepositoryError::query("insert observation"))?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(RepositoryError::Transaction)?;
        Ok(WriteOutcome {
            attempted: rows.len(),
            inserted,
        })
    }

    async fn average_temperature(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, RepositoryError> {
        sqlx::query_scalar::<_, Option<f64>>(AVERAGE_TEMPERATURE)
            .bind(station_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::query("average temperature"))
    }

    async fn max_wind_speed_delta(
        &self,
        station_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, RepositoryError> {
        sqlx::query_scalar::<_, Option<f64>>(MAX_WIND_SPEED_DELTA)
            .bind(station_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::query("max wind speed delta"))
    }

    async fn get_station(&self, station_id: &str) -> Result<Option<StationInfo>, RepositoryError> {
        let record = sqlx::query_as(SELECT_STATION)
            .bind(station_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::query("select station"))?;
        Ok(record.map(station_from_record))
    }

    async fn station_count(&self) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stations")
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::query("count stations"))
    }

    async fn observation_count(&self, station_id: &str) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM observations WHERE station_id = ?")
            .bind(station_id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::query("count observations"))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
