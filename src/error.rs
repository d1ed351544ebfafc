use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("signal catalog error: {0}")]
    Catalog(String),
    #[error("state lock poisoned")]
    StateLock,
}

impl AppError {
    /// Failures worth a second attempt against the same collaborator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::UpstreamUnavailable(_))
    }
}
