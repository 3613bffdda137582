//! Error handling for the writer pool
//!
//! This module provides error types and result aliases for pool operations.

use std::io;
use thiserror::Error;

/// Errors that can occur in writer pool operations
#[derive(Error, Debug)]
pub enum Error {
    /// A destination could not be opened for a new writer
    #[error("Failed to create writer at {path}: {source}")]
    Creation {
        path: String,
        #[source]
        source: io::Error,
    },

    /// An append was rejected by the writer's destination
    #[error("Failed to write to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The writer's handle has already been closed
    #[error("Writer is closed: {0}")]
    WriterClosed(String),

    /// The record resolved to a bucket that cannot be represented as a path
    #[error("Invalid bucket: {0}")]
    InvalidBucket(String),

    /// Errors related to configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error type for other cases
    #[error("{0}")]
    Other(String),
}

/// Result type for writer pool operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new creation error
    pub fn creation(path: impl Into<String>, source: io::Error) -> Self {
        Self::Creation {
            path: path.into(),
            source,
        }
    }

    /// Create a new write error
    pub fn write(path: impl Into<String>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create a new closed writer error
    pub fn writer_closed(path: impl Into<String>) -> Self {
        Self::WriterClosed(path.into())
    }

    /// Create a new invalid bucket error
    pub fn invalid_bucket(message: impl Into<String>) -> Self {
        Self::InvalidBucket(message.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Check if this is a creation error
    pub fn is_creation_error(&self) -> bool {
        matches!(self, Self::Creation { .. })
    }

    /// Check if this is a write error
    pub fn is_write_error(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Check if this is an invalid bucket error
    pub fn is_invalid_bucket(&self) -> bool {
        matches!(self, Self::InvalidBucket(_))
    }

    /// Check if this is an I/O error
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Get a user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Creation { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
                Some("You don't have permission to create files under the top-level path".to_string())
            }
            Self::Creation { .. } => Some("Check if the top-level path exists and is writable".to_string()),
            Self::Write { .. } => Some("Check available disk space and backend reachability".to_string()),
            Self::InvalidBucket(_) => Some("Check the record timestamp; it must be a positive epoch in milliseconds".to_string()),
            Self::Config(_) => Some("Review the pool configuration values".to_string()),
            _ => None,
        }
    }
}
