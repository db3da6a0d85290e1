use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Failed to connect to database")]
    Connect(#[source] sqlx::Error),

    #[error("Failed to create schema")]
    Schema(#[source] sqlx::Error),

    #[error("Database operation '{operation}' failed")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Transaction failed")]
    Transaction(#[source] sqlx::Error),
}

impl RepositoryError {
    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| RepositoryError::Query { operation, source }
    }
}
