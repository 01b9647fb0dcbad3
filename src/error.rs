//! Error types for cairn operations.
//!
//! This module defines [`CairnError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `CairnError` for cache-specific errors that need distinct handling
//! - Producer and consumer callbacks report failures as `anyhow::Error`,
//!   which the store wraps together with the affected key
//! - The entry lock is always released before any error reaches the caller

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for cairn operations.
#[derive(Debug, Error)]
pub enum CairnError {
    /// Entry lock not acquired within the configured timeout.
    ///
    /// The entry itself is untouched; callers may retry later.
    #[error("Timed out acquiring lock {path} after {waited:?}")]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Producer callback failed. The entry is left without a completion
    /// marker and remains retryable.
    #[error("Producer failed for entry '{key}': {source}")]
    Producer {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Consumer callback failed. The entry's state is unaffected.
    #[error("Consumer failed for entry '{key}': {source}")]
    Consumer {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Unrecognized overwrite policy value.
    #[error("Invalid overwrite policy '{value}' (expected no, yes, or if-failed)")]
    InvalidPolicy { value: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for cairn operations.
pub type Result<T> = std::result::Result<T, CairnError>;
