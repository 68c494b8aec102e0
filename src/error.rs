//! Error types for the memoization cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the memoization cache.
///
/// Errors raised by a wrapped callable never pass through this type; they are
/// handed back to the caller untouched.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configured validity normalizes to a negative (or unrepresentable) span
    #[error("Invalid cache duration: {0}")]
    InvalidDuration(String),

    /// Callable name is empty
    #[error("Invalid callable id: {0}")]
    InvalidCallableId(String),

    /// Call arguments cannot be canonically encoded
    #[error("Unserializable argument: {0}")]
    UnserializableArgument(String),

    /// Computed result cannot be encoded, or a stored one cannot be decoded
    #[error("Unserializable result: {0}")]
    UnserializableResult(String),

    /// More than one stored entry shares a single identity
    #[error("Cache corrupted: {matches} entries stored for identity {identity}; clear it and retry")]
    CacheCorruption { identity: String, matches: usize },

    /// Backing store could not be read or written
    #[error("Store unavailable at {}: {reason}", path.display())]
    StoreUnavailable { path: PathBuf, reason: String },
}

impl CacheError {
    /// Builds a `StoreUnavailable` from any displayable cause.
    pub fn store(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        CacheError::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the memoization cache.
pub type Result<T> = std::result::Result<T, CacheError>;
