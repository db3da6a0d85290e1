//! Ingests api.weather.gov station metadata and observations into a relational store
//! and computes rolling analytics over them.
//!
//! The write path is [`StationClient`] → [`normalize`] → [`ObservationStore`], the
//! read path is [`ObservationStore`] → [`Aggregator`]. [`PipelineRunner`] runs both
//! for one station.

mod aggregator;
mod client;
mod config;
mod error;
mod normalize;
mod pipeline;
mod repository;
mod types;

pub use error::PipelineError;

pub use aggregator::{Aggregate, Aggregator, AnalyticsReport};
pub use client::error::ClientError;
pub use client::station_client::{observation_window, StationClient};
pub use config::*;
pub use normalize::{normalize, normalize_batch, round_value, NormalizeError, NormalizedBatch};
pub use pipeline::{run_once, IngestSummary, PipelineReport, PipelineRunner, StepOutcome};
pub use repository::{
    connect, ObservationStore, PgRepository, RepositoryError, SqliteRepository, WriteOutcome,
};
pub use types::observation::{ObservationRow, RawObservation};
pub use types::station::{StationInfo, StationSummary};
