//! Error types for GamePulse

use std::time::Duration;

use thiserror::Error;

use crate::models::Platform;

/// Result type alias using GamePulse's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of failures, used to decide how a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credentials or invalid settings
    Configuration,
    /// The external source failed or is disabled
    Upstream,
    /// A successful response did not have the expected shape
    DataShape,
    /// The query could not be mapped to a data source
    Routing,
    /// Local plumbing (IO, serialization, bugs)
    Internal,
}

/// Error types for GamePulse operations
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials for a source are not configured
    #[error("Unable to access {platform} API, please add an API key or check with your system admin.")]
    MissingCredentials {
        /// Source without usable credentials
        platform: Platform,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source API failure
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Declared chart columns are absent from the payload
    #[error("Missing required columns: {x}, {y}")]
    MissingColumns {
        /// Expected label column
        x: String,
        /// Expected value column
        y: String,
    },

    /// Payload did not have the expected structure
    #[error("{0}")]
    DataShape(String),

    /// A game name could not be mapped to a store id
    #[error("Could not find Steam ID for '{0}'")]
    GameNotFound(String),

    /// Query could not be routed
    #[error("{0}")]
    Routing(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error outside of a source call
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a data shape error
    pub fn data_shape(msg: impl Into<String>) -> Self {
        Self::DataShape(msg.into())
    }

    /// Create a missing columns error
    pub fn missing_columns(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self::MissingColumns {
            x: x.into(),
            y: y.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingCredentials { .. } | Self::Config(_) => ErrorKind::Configuration,
            Self::Upstream(_) | Self::Http(_) => ErrorKind::Upstream,
            Self::MissingColumns { .. } | Self::DataShape(_) | Self::GameNotFound(_) => {
                ErrorKind::DataShape
            }
            Self::Routing(_) => ErrorKind::Routing,
            Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Failures reported while calling an external source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    /// The circuit breaker has disabled this endpoint
    #[error("Endpoint {0} temporarily disabled after repeated failures")]
    EndpointDisabled(String),

    /// The source asked us to slow down
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Non-success HTTP status
    #[error("request failed: API request failed with status {0}")]
    Status(u16),

    /// Connection-level failure
    #[error("request failed: {0}")]
    Transport(String),

    /// No response within the configured timeout
    #[error("request failed: timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Response body was not valid JSON
    #[error("request failed: invalid response body ({0})")]
    Decode(String),

    /// The source answered with an error envelope
    #[error("{0}")]
    Reported(String),

    /// The source answered with an empty payload
    #[error("No {0} data returned")]
    NoData(String),
}

impl UpstreamError {
    /// Whether this failure should count against the endpoint's circuit breaker
    pub fn trips_breaker(&self) -> bool {
        matches!(
            self,
            Self::Status(_) | Self::Transport(_) | Self::Timeout(_) | Self::Decode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_message() {
        let err = Error::MissingCredentials {
            platform: Platform::Gamalytic,
        };
        assert_eq!(
            err.to_string(),
            "Unable to access Gamalytic API, please add an API key or check with your system admin."
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_rate_limit_does_not_trip_breaker() {
        assert!(!UpstreamError::RateLimited.trips_breaker());
        assert!(UpstreamError::Status(500).trips_breaker());
        assert!(!UpstreamError::Reported("nope".into()).trips_breaker());
    }

    #[test]
    fn test_missing_columns_message() {
        let err = Error::missing_columns("name", "viewer_count");
        assert_eq!(err.to_string(), "Missing required columns: name, viewer_count");
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }
}
