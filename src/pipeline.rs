//! Orchestrates one ingestion pass for a single station.
//!
//! The steps run in a fixed order: schema, station metadata, observations,
//! analytics. Apart from schema creation none of them can abort the run. A failing
//! step is logged, recorded in the [`PipelineReport`] and the next step runs anyway,
//! since partial data is more useful than no data.

use crate::aggregator::{Aggregator, AnalyticsReport};
use crate::client::station_client::{observation_window, StationClient};
use crate::config::{AppConfig, PipelineConfig};
use crate::error::PipelineError;
use crate::normalize::normalize_batch;
use crate::repository::{self, ObservationStore, WriteOutcome};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::fmt;

/// What happened to one pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Completed(T),
    /// Nothing to do, e.g. the upstream returned no data.
    Skipped(String),
    Failed(String),
}

impl<T> StepOutcome<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            StepOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

impl<T: fmt::Display> fmt::Display for StepOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Completed(value) => write!(f, "{value}"),
            StepOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            StepOutcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Counts for the observation ingestion step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub fetched: usize,
    pub malformed: usize,
    pub inserted: usize,
    pub ignored: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetched, {} malformed, {} inserted, {} already stored",
            self.fetched, self.malformed, self.inserted, self.ignored
        )
    }
}

/// The result of a whole run, one outcome per step.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub station_id: String,
    pub station: StepOutcome<WriteOutcome>,
    pub observations: StepOutcome<IngestSummary>,
    pub analytics: StepOutcome<AnalyticsReport>,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Station {}", self.station_id)?;
        match &self.station {
            StepOutcome::Completed(w) if w.inserted == 0 => {
                writeln!(f, "  metadata: already stored")?
            }
            StepOutcome::Completed(_) => writeln!(f, "  metadata: stored")?,
            StepOutcome::Skipped(reason) => writeln!(f, "  metadata: skipped ({reason})")?,
            StepOutcome::Failed(reason) => writeln!(f, "  metadata: failed ({reason})")?,
        }
        writeln!(f, "  observations: {}", self.observations)?;
        writeln!(f)?;
        writeln!(
            f,
            "--- calculating metrics for the last {} days ---",
            self.analytics
                .completed()
                .map_or(crate::config::DEFAULT_WINDOW_DAYS, |a| a.window_days)
        )?;
        writeln!(f)?;
        write!(f, "{}", self.analytics)
    }
}

/// Runs the fetch → normalise → persist → aggregate sequence for one station.
pub struct PipelineRunner<'a> {
    client: &'a StationClient,
    store: &'a dyn ObservationStore,
    config: &'a PipelineConfig,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        client: &'a StationClient,
        store: &'a dyn ObservationStore,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Runs every step once, ending the fetch range and analytics window now.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        self.run_at(Utc::now()).await
    }

    /// Runs every step once with an explicit "now". It ends both the observation
    /// fetch range and the analytics window.
    ///
    /// # Errors
    ///
    /// Only a schema failure is returned as an error; it means the store is unusable.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<PipelineReport, PipelineError> {
        let station_id = self.config.station_id.as_str();
        info!("Starting pipeline run for station {}", station_id);

        self.store.ensure_schema().await?;

        let station = self.ingest_station(station_id).await;
        let observations = self.ingest_observations(station_id, now).await;
        let analytics = self.compute_analytics(station_id, now).await;

        Ok(PipelineReport {
            station_id: station_id.to_string(),
            station,
            observations,
            analytics,
        })
    }

    async fn ingest_station(&self, station_id: &str) -> StepOutcome<WriteOutcome> {
        let station = match self.client.fetch_station_info(station_id).await {
            Ok(Some(station)) => station,
            Ok(None) => {
                return StepOutcome::Skipped("no station properties returned".to_string());
            }
            Err(e) => {
                warn!("Failed to fetch station info for {}: {}", station_id, e);
                return StepOutcome::Failed(e.to_string());
            }
        };

        match self.store.upsert_station(&station).await {
            Ok(outcome) => {
                if outcome.inserted > 0 {
                    info!("Station {} inserted", station_id);
                } else {
                    info!("Station {} already stored", station_id);
                }
                StepOutcome::Completed(outcome)
            }
            Err(e) => {
                error!("Failed to store station {}: {}", station_id, e);
                StepOutcome::Failed(e.to_string())
            }
        }
    }

    async fn ingest_observations(
        &self,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> StepOutcome<IngestSummary> {
        let (start, end) = observation_window(now, self.config.lookback_days);
        info!(
            "Attempting to fetch data from {} to {}",
            start.date_naive(),
            end.date_naive()
        );

        let raws = match self
            .client
            .try_fetch_observations(station_id, start, end)
            .await
        {
            Ok(raws) => raws,
            Err(e) => {
                match e.status() {
                    Some(status) => warn!("Failed to fetch observations: {}", status.as_u16()),
                    None => warn!("Failed to fetch observations: {}", e),
                }
                return StepOutcome::Failed(e.to_string());
            }
        };
        if raws.is_empty() {
            return StepOutcome::Skipped("no observations returned".to_string());
        }

        let batch = normalize_batch(&raws);
        let mut summary = IngestSummary {
            fetched: raws.len(),
            malformed: batch.malformed,
            ..IngestSummary::default()
        };
        if batch.rows.is_empty() {
            return StepOutcome::Completed(summary);
        }

        match self
            .store
            .upsert_observations(station_id, &batch.rows)
            .await
        {
            Ok(outcome) => {
                summary.inserted = outcome.inserted;
                summary.ignored = outcome.ignored();
                info!("Observations for {}: {}", station_id, summary);
                StepOutcome::Completed(summary)
            }
            Err(e) => {
                error!("Failed to store observations for {}: {}", station_id, e);
                StepOutcome::Failed(e.to_string())
            }
        }
    }

    async fn compute_analytics(
        &self,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> StepOutcome<AnalyticsReport> {
        let aggregator = Aggregator::new(self.store, self.config.window_days);
        match aggregator.report(station_id, now).await {
            Ok(report) => StepOutcome::Completed(report),
            Err(e) => {
                error!("Failed to compute analytics for {}: {}", station_id, e);
                StepOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Connects, runs one pass and disconnects.
///
/// The store is closed on every path once it has been opened, including when the
/// run itself fails.
///
/// # Errors
///
/// Fails if the HTTP client cannot be built, the database is unreachable, or the
/// schema cannot be created.
pub async fn run_once(config: &AppConfig) -> Result<PipelineReport, PipelineError> {
    let client = StationClient::new(&config.client)?;
    let store = repository::connect(&config.database).await?;
    let result = PipelineRunner::new(&client, store.as_ref(), &config.pipeline)
        .run()
        .await;
    store.close().await;
    result
}
