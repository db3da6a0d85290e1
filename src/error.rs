use crate::client::error::ClientError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// Errors that end a pipeline run. Everything else is absorbed per step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
