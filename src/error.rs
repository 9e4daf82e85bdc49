//! Error types for the feed loader.

use crate::feed::Feed;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while loading feeds.
///
/// `MalformedRecord` and `InvalidNumeric` describe a single bad record and are
/// recovered by skipping it. Every other variant aborts the run.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Network or protocol failure talking to a feed endpoint or the database
    #[error("Transport error: {0}")]
    Transport(String),

    /// Record has the wrong number of fields or cannot be parsed structurally
    #[error("Malformed {feed} record: {message}")]
    MalformedRecord { feed: Feed, message: String },

    /// Numeric field is not an integer
    #[error("Invalid numeric field `{field}` in {feed} record: {value:?}")]
    InvalidNumeric {
        feed: Feed,
        field: &'static str,
        value: String,
    },

    /// The feed payload as a whole has the wrong shape
    #[error("Malformed {feed} feed: {message}")]
    MalformedFeed { feed: Feed, message: String },

    /// The resolver already holds the mapping for this feed
    #[error("Identifier mapping for {0} feed was already recorded")]
    ResolverConflict(Feed),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tabular parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Failed to read a local feed file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid command-line configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl LoaderError {
    /// Returns `true` for per-record failures that only skip the record.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            LoaderError::MalformedRecord { .. } | LoaderError::InvalidNumeric { .. }
        )
    }

    pub(crate) fn malformed(feed: Feed, message: impl Into<String>) -> Self {
        LoaderError::MalformedRecord {
            feed,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for LoaderError {
    fn from(err: reqwest::Error) -> Self {
        LoaderError::Transport(err.to_string())
    }
}
