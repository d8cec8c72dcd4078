use thiserror::Error;

/// Application-wide error types for jobscout.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request to the search API failed (server error or protocol failure).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The search API signalled a rate limit.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The provider rejected the request itself (bad query/location/source
    /// combination). Retrying the same request cannot succeed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A notification channel failed to deliver.
    #[error("Notification error: {0}")]
    NotifyError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Transient: network trouble, timeouts, rate limits. Everything else
    /// (bad request, decode failure, database, config) is permanent for
    /// the purposes of a single task.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
                | AppError::HttpError(_)
        )
    }

    /// Returns true if the source signalled a rate limit, which should arm
    /// the per-source cooldown in addition to being retryable.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AppError::RateLimitExceeded)
    }
}
