//! PostgreSQL backend.

use crate::config::PostgresConfig;
use crate::repository::error::RepositoryError;
use crate::repository::{station_from_record, ObservationStore, WriteOutcome};
use crate::types::observation::ObservationRow;
use crate::types::station::StationInfo;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS stations (
        station_id VARCHAR(255) PRIMARY KEY,
        name VARCHAR(255),
        timezone VARCHAR(255),
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS observations (
        station_id VARCHAR(255) NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        temperature DOUBLE PRECISION,
        wind_speed DOUBLE PRECISION,
        humidity DOUBLE PRECISION,
        PRIMARY KEY (station_id, timestamp),
        FOREIGN KEY (station_id) REFERENCES stations (station_id)
    )
    "#,
];

const INSERT_STATION: &str = r#"
    INSERT INTO stations (station_id, name, timezone, latitude, longitude)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (station_id) DO NOTHING
"#;

const INSERT_OBSERVATION: &str = r#"
    INSERT INTO observations (station_id, timestamp, temperature, wind_speed, humidity)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (station_id, timestamp) DO NOTHING
"#;

const SELECT_STATION: &str = r#"
    SELECT station_id, name, timezone, latitude, longitude
    FROM stations
    WHERE station_id = $1
"#;

const AVERAGE_TEMPERATURE: &str = r#"
    SELECT AVG(temperature)
    FROM observations
    WHERE station_id = $1
      AND timestamp >= $2
"#;

const MAX_WIND_SPEED_DELTA: &str = r#"
    WITH wind_speed_changes AS (
        SELECT wind_speed,
               LAG(wind_speed) OVER (ORDER BY timestamp) AS previous_wind_speed
        FROM observations
        WHERE station_id = $1
          AND timestamp >= $2
    )
    SELECT MAX(ABS(wind_speed - previous_wind_speed))
    FROM wind_speed_changes
    WHERE previous_wind_speed IS NOT NULL
"#;

/// Stores stations and observations in PostgreSQL over a single connection.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, RepositoryError> {
        let repository = Self::connect_with(connect_options(config)).await?;
        info!(
            "Connected to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(repository)
    }

    async fn connect_with(options: PgConnectOptions) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(RepositoryError::Connect)?;
        Ok(Self { pool })
    }
}

fn connect_options(config: &PostgresConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .password(&config.password)
}

#[async_trait]
impl ObservationStore for PgRepository {
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
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM observations WHERE station_id = $1")
            .bind(station_id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::query("count observations"))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::window_start;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_connect_options_carry_config() {
        let config = PostgresConfig::builder()
            .host("db.internal")
            .port(6543)
            .database("weather")
            .user("ingest")
            .password("secret")
            .build();
        let options = connect_options(&config);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("weather"));
        assert_eq!(options.get_username(), "ingest");
    }

    fn row(
        timestamp: DateTime<Utc>,
        temperature: Option<f64>,
        wind: Option<f64>,
    ) -> ObservationRow {
        ObservationRow {
            timestamp,
            temperature,
            wind_speed: wind,
            humidity: None,
        }
    }

    // Needs a disposable server: DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_against_live_server() -> Result<(), RepositoryError> {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let options: PgConnectOptions = url.parse().map_err(RepositoryError::Connect)?;
        let repo = PgRepository::connect_with(options).await?;
        repo.ensure_schema().await?;
        repo.ensure_schema().await?;

        let station_id = format!("T{}", Utc::now().timestamp_micros());
        let station = StationInfo {
            station_id: station_id.clone(),
            name: Some("Norman Mesonet".to_string()),
            timezone: Some("America/Chicago".to_string()),
            latitude: Some(35.2),
            longitude: Some(-97.5),
        };
        assert_eq!(repo.upsert_station(&station).await?.inserted, 1);
        assert_eq!(repo.upsert_station(&station).await?.inserted, 0);
        assert_eq!(repo.get_station(&station_id).await?, Some(station));

        let end = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        let rows = vec![
            row(end - Duration::hours(1), Some(10.0), Some(3.0)),
            row(end - Duration::hours(3), None, Some(5.0)),
            row(end - Duration::hours(2), Some(20.0), Some(9.0)),
            row(end - Duration::days(10), Some(100.0), Some(50.0)),
        ];
        let first = repo.upsert_observations(&station_id, &rows).await?;
        assert_eq!((first.attempted, first.inserted), (4, 4));
        let replay = repo.upsert_observations(&station_id, &rows).await?;
        assert_eq!(replay.ignored(), 4);
        assert_eq!(repo.observation_count(&station_id).await?, 4);

        let since = window_start(end, 7);
        assert_eq!(
            repo.average_temperature(&station_id, since).await?,
            Some(15.0)
        );
        assert_eq!(
            repo.max_wind_speed_delta(&station_id, since).await?,
            Some(6.0)
        );

        let orphan = repo.upsert_observations("MISSING-STATION", &rows).await;
        assert!(orphan.is_err());

        for statement in [
            "DELETE FROM observations WHERE station_id = $1",
            "DELETE FROM stations WHERE station_id = $1",
        ] {
            sqlx::query(statement)
                .bind(&station_id)
                .execute(&repo.pool)
                .await
                .map_err(RepositoryError::query("cleanup"))?;
        }
        repo.close().await;
        Ok(())
    }
}
