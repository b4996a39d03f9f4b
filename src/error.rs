//! Error types for the segment cache.
//!
//! All errors that can occur within the cache are represented by
//! [`CacheError`]. A missing header or body is not an error — callers see
//! `Ok(None)` for that — so every variant here represents an actual fault
//! the caller needs to know about.

use std::fmt;

/// Primary error type for the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A provider call did not complete within its configured budget
    /// (read/lookup/write/scan). Recoverable: the caller may retry.
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// The provider raised an unexpected failure.
    #[error("provider failure during {operation}: {source}")]
    ProviderFailure {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A header or body refused to round-trip through the provider's
    /// serialization.
    #[error("failed to (de)serialize {what} for provider round-trip: {reason}")]
    SerializationFailure { what: String, reason: String },

    /// An internal consistency check failed: thread-ownership violation,
    /// a requested expression missing from a header that should carry it,
    /// or similar programmer errors.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl CacheError {
    pub fn kind(&self) -> CacheErrorKind {
        match self {
            CacheError::Timeout { .. } => CacheErrorKind::Timeout,
            CacheError::ProviderFailure { .. } => CacheErrorKind::ProviderFailure,
            CacheError::SerializationFailure { .. } => CacheErrorKind::SerializationFailure,
            CacheError::InvariantViolation(_) => CacheErrorKind::InvariantViolation,
        }
    }

    /// Whether the caller may reasonably retry the same operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CacheError::Timeout { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheErrorKind {
    Timeout,
    ProviderFailure,
    SerializationFailure,
    InvariantViolation,
}

impl fmt::Display for CacheErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheErrorKind::Timeout => write!(f, "TIMEOUT"),
            CacheErrorKind::ProviderFailure => write!(f, "PROVIDER_FAILURE"),
            CacheErrorKind::SerializationFailure => write!(f, "SERIALIZATION_FAILURE"),
            CacheErrorKind::InvariantViolation => write!(f, "INVARIANT_VIOLATION"),
        }
    }
}
