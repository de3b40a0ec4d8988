//! Error types for the tagcache library.
//!
//! Backend and codec failures propagate unchanged to the caller. Operations that
//! find nothing to do report `false`/`None` instead of an error.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    // Storage errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Codec errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Compression error: {message}")]
    Compression {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Caller contract violations
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CacheError {
    /// Wrap a rusqlite error with a short description of what was attempted.
    pub fn database(context: &str, err: rusqlite::Error) -> Self {
        CacheError::Database {
            message: format!("{}: {}", context, err),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        CacheError::Config {
            message: message.into(),
        }
    }

    /// True when the storage backend rejected or could not run a statement.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, CacheError::Database { .. } | CacheError::Io { .. })
    }

    /// True when the failure is the caller's input rather than a fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CacheError::Validation { .. } | CacheError::Config { .. }
        )
    }
}
