use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client")]
    Build(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to decode response body from {0}")]
    Decode(String, #[source] reqwest::Error),
}

impl ClientError {
    /// The HTTP status, when the failure was a non-success response.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ClientError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
