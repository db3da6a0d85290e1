//! Runtime configuration for a pipeline run.
//!
//! Everything is read from the process environment (optionally seeded from a `.env`
//! file) into explicit structs that are handed to the components that need them.
//! Nothing is stored globally.

use bon::Builder;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.weather.gov";
pub const DEFAULT_STATION_ID: &str = "032HE";
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Roughly ten years. The provider truncates to its own retention window.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365 * 10;
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' is not set")]
    MissingVar(&'static str),

    #[error("Environment variable '{name}' has invalid value '{value}': {reason}")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection parameters for a PostgreSQL server.
#[derive(Clone, PartialEq, Builder)]
pub struct PostgresConfig {
    #[builder(into)]
    pub host: String,
    #[builder(default = DEFAULT_POSTGRES_PORT)]
    pub port: u16,
    #[builder(into)]
    pub database: String,
    #[builder(into)]
    pub user: String,
    #[builder(into)]
    pub password: String,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Location of an embedded SQLite database. `:memory:` keeps everything in RAM.
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl SqliteConfig {
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

/// Which relational store to persist into.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Postgres(PostgresConfig),
    Sqlite(SqliteConfig),
}

/// Settings for the api.weather.gov HTTP client.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct ClientConfig {
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    #[builder(into, default = default_user_agent())]
    pub user_agent: String,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What a single pipeline pass works on.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct PipelineConfig {
    #[builder(into, default = DEFAULT_STATION_ID.to_string())]
    pub station_id: String,
    #[builder(default = DEFAULT_LOOKBACK_DAYS)]
    pub lookback_days: i64,
    #[builder(default = DEFAULT_WINDOW_DAYS)]
    pub window_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The complete configuration of the `weather-pipeline` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub client: ClientConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Recognised variables:
    ///
    /// * `DB_SQLITE_PATH`: when set, use SQLite at this path and ignore the `DB_*` server settings.
    /// * `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`: PostgreSQL connection.
    /// * `WEATHER_API_BASE_URL`, `WEATHER_USER_AGENT`, `WEATHER_REQUEST_TIMEOUT_SECS`: HTTP client.
    /// * `WEATHER_STATION_ID`: station to ingest.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::MissingVar(name));

        let database = match var("DB_SQLITE_PATH") {
            Some(path) => DatabaseConfig::Sqlite(SqliteConfig {
                path: PathBuf::from(path),
            }),
            None => DatabaseConfig::Postgres(
                PostgresConfig::builder()
                    .host(required("DB_HOST")?)
                    .port(parse_or("DB_PORT", var("DB_PORT"), DEFAULT_POSTGRES_PORT)?)
                    .database(required("DB_NAME")?)
                    .user(required("DB_USER")?)
                    .password(required("DB_PASSWORD")?)
                    .build(),
            ),
        };

        let timeout_secs = parse_or(
            "WEATHER_REQUEST_TIMEOUT_SECS",
            var("WEATHER_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?;
        let client = ClientConfig::builder()
            .maybe_base_url(var("WEATHER_API_BASE_URL"))
            .maybe_user_agent(var("WEATHER_USER_AGENT"))
            .request_timeout(Duration::from_secs(timeout_secs))
            .build();

        let pipeline = PipelineConfig::builder()
            .maybe_station_id(var("WEATHER_STATION_ID"))
            .build();

        Ok(Self {
            database,
            client,
            pipeline,
        })
    }
}

fn default_user_agent() -> String {
    format!("weather-pipeline/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::InvalidVar {
                name,
                reason: e.to_string(),
                value,
            }),
        },
    }
}
