use thiserror::Error;

/// Errors that can occur when talking to CloudWatch.
///
/// Every runtime failure of a `PutMetricData` call maps to one of these
/// variants and is handed back to the caller as-is.
#[derive(Debug, Error)]
pub enum CloudWatchError {
    /// The client could not be built from the supplied configuration.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No usable credentials were supplied.
    #[error("Missing credentials: {message}")]
    MissingCredentials { message: String },

    /// Network error (connection failed, timeout, etc.).
    #[error("Network error: {message}")]
    Network { message: String },

    /// The request was rejected as unauthenticated or unauthorized.
    #[error("Authentication failed ({code}): {message}")]
    Authentication { code: String, message: String },

    /// Throttled by the service.
    #[error("Throttled ({code}): {message}")]
    Throttled { code: String, message: String },

    /// The service rejected the request parameters.
    #[error("Invalid request ({code}): {message}")]
    InvalidRequest { code: String, message: String },

    /// The service returned a 5xx error.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
}

impl CloudWatchError {
    /// Returns true if this error is transient and the operation could be retried.
    ///
    /// The publisher never retries on its own; this is for callers that want to.
    pub fn is_retryable(&self) -> bool {
        match self {
            CloudWatchError::Network { .. } => true,
            CloudWatchError::Throttled { .. } => true,
            CloudWatchError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the AWS error code reported by the service, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            CloudWatchError::Authentication { code, .. }
            | CloudWatchError::Throttled { code, .. }
            | CloudWatchError::InvalidRequest { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type for CloudWatch operations.
pub type CloudWatchResult<T> = std::result::Result<T, CloudWatchError>;
