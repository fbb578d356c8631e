//! Error types and Result aliases for treewatch.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use std::path::Path;

use thiserror::Error;

/// Result type alias using treewatch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for treewatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watch(#[from] WatchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised while establishing or tearing down watches.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The path does not exist.
    #[error("path '{path}' does not exist")]
    NotFound { path: String },

    /// Reading the path's metadata failed.
    #[error("failed to stat '{path}': {reason}")]
    StatFailed { path: String, reason: String },

    /// Listing a directory's children failed.
    #[error("failed to list directory '{path}': {reason}")]
    ListFailed { path: String, reason: String },

    /// The watch primitive refused the subscription.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// The watch primitive failed to release a subscription.
    #[error("failed to release watch on '{path}': {reason}")]
    ReleaseFailed { path: String, reason: String },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means the path vanished.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Watch(WatchError::NotFound { .. }) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl WatchError {
    /// Create a not-found error.
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound {
            path: path.display().to_string(),
        }
    }

    /// Classify an I/O failure from `stat`.
    pub fn stat(path: &Path, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(path)
        } else {
            Self::StatFailed {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Classify an I/O failure from a directory listing.
    pub fn list(path: &Path, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(path)
        } else {
            Self::ListFailed {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        }
    }
}
