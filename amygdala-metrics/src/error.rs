//! Crate-level error type.
//!
//! Publishing returns [`CloudWatchError`] directly so the backend's cause is
//! never hidden. `MetricsError` covers everything else and can absorb a
//! publish failure for callers that want a single error type.

use thiserror::Error;

use crate::cloudwatch::CloudWatchError;

/// The main error type for the library.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// A metric could not be published.
    #[error("Publish failed: {0}")]
    Publish(#[from] CloudWatchError),

    /// An engagement data source failed to produce a count.
    #[error("Data source '{source_name}' failed: {message}")]
    DataSource {
        /// Name of the source operation that failed
        source_name: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// A type alias for `Result<T, MetricsError>`.
pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Creates a data source error without an underlying cause.
    pub fn data_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_name: source_name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a data source error wrapping the error that caused it.
    pub fn data_source_with_cause<E>(
        source_name: impl Into<String>,
        message: impl Into<String>,
        cause: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::DataSource {
            source_name: source_name.into(),
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_publish_error_keeps_cause() {
        let err: MetricsError = CloudWatchError::Network {
            message: "connection reset".to_string(),
        }
        .into();
        assert!(err.to_string().contains("connection reset"));
        assert!(matches!(
            err,
            MetricsError::Publish(CloudWatchError::Network { .. })
        ));
    }

    #[test]
    fn test_data_source_error() {
        let err = MetricsError::data_source("daily_active_users", "query timed out");
        assert_eq!(
            err.to_string(),
            "Data source 'daily_active_users' failed: query timed out"
        );
        assert!(err.source().is_none());

        let cause = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = MetricsError::data_source_with_cause("total_users", "query failed", cause);
        assert!(err.source().is_some());
    }
}
