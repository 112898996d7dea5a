use thiserror::Error;

/// Errors surfaced by the royalty pipeline to its callers.
///
/// Numeric edge cases (zero streams, empty series) are not errors: they
/// resolve to neutral outputs inside the engines.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Export format '{0}' is not yet implemented")]
    UnsupportedExport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyticsError {
    /// True for errors caused by the caller's request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalyticsError::MissingField(_) | AnalyticsError::InvalidInput(_)
        )
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
