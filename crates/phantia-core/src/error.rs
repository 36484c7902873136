//! Core errors

use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`crate::KeyValueStore`] adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store command failed: {0}")]
    Command(String),
}

impl StoreError {
    /// Connection-level failures the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid key prefix {0:?}: must be non-empty and free of ':'")]
    InvalidPrefix(String),

    #[error("Identifier must not be empty")]
    EmptyIdentifier,

    #[error("Malformed key: {0}")]
    Malformed(String),
}

/// Errors surfaced by the coordination components.
#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("Corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StateError::Store(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Unavailable("refused".into()).is_retryable());
        assert!(StoreError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(!StoreError::Command("WRONGTYPE".into()).is_retryable());

        let wrapped = StateError::from(StoreError::Timeout(Duration::from_secs(1)));
        assert!(wrapped.is_retryable());

        let corrupt = StateError::Corrupt { key: "k".into(), reason: "eof".into() };
        assert!(!corrupt.is_retryable());
    }
}
