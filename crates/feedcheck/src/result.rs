//! Result and error types for Feedcheck.
//!
//! Only run-level conditions are errors. Per-item problems (unparseable timestamps,
//! failed lookups, ordering violations) are diagnostics on the report.

use thiserror::Error;

/// Result type for Feedcheck operations
pub type FeedcheckResult<T> = Result<T, FeedcheckError>;

/// Errors that can occur in Feedcheck
#[derive(Debug, Error)]
pub enum FeedcheckError {
    /// The page driver could not serve a request
    #[error("Page driver unavailable: {message}")]
    DriverUnavailable {
        /// Error message
        message: String,
    },

    /// Fewer unique items were reachable than the caller demanded
    #[error("Collection incomplete: {collected} of {target} unique items reachable")]
    CollectionIncomplete {
        /// Items collected
        collected: usize,
        /// Items requested
        target: usize,
    },

    /// Invalid run configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Listing or lookup fixture could not be loaded
    #[error("Fixture error: {message}")]
    Fixture {
        /// Error message
        message: String,
    },

    /// Pacing state could not be read or written
    #[error("Pacing state error: {message}")]
    PacingState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedcheckError {
    /// Create a driver unavailable error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::DriverUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a fixture error
    #[must_use]
    pub fn fixture(message: impl Into<String>) -> Self {
        Self::Fixture {
            message: message.into(),
        }
    }

    /// Create a pacing state error
    #[must_use]
    pub fn pacing(message: impl Into<String>) -> Self {
        Self::PacingState {
            message: message.into(),
        }
    }
}
