//! Error types for dataflag-core

use thiserror::Error;

use crate::flag::{FlagId, FlagStatus};

/// Result type alias for dataflag operations
pub type Result<T> = std::result::Result<T, DataFlagError>;

/// Main error type for dataflag operations
#[derive(Error, Debug)]
pub enum DataFlagError {
    /// Flag type code is not registered
    #[error("Unknown flag type: {0}")]
    UnknownType(String),

    /// Flag type code is already registered
    #[error("Flag type already registered: {0}")]
    DuplicateType(String),

    /// Interval bounds are out of order or not finite
    #[error("Invalid interval: start {start}, end {end:?}; bounds must be finite and ordered")]
    InvalidInterval { start: f64, end: Option<f64> },

    /// Data revision name is not registered
    #[error("Unknown data revision: {0}")]
    UnknownRevision(String),

    /// Data revision name is already registered
    #[error("Data revision already registered: {0}")]
    DuplicateRevision(String),

    /// Flag does not exist
    #[error("Flag not found: {0}")]
    NotFound(FlagId),

    /// Status change not allowed by the transition table
    #[error("Invalid status transition for flag {id}: {from} -> {to}")]
    InvalidTransition {
        id: FlagId,
        from: FlagStatus,
        to: FlagStatus,
    },

    /// Operation requires the flag to be in a different status
    #[error("Flag {id} is {status}, cannot accept vote from {reviewer}")]
    InvalidState {
        id: FlagId,
        status: FlagStatus,
        reviewer: String,
    },

    /// Lost an optimistic-concurrency race; retry the operation
    #[error("Concurrent update on flag {id}: expected version {expected}, found {actual}")]
    Conflict {
        id: FlagId,
        expected: u64,
        actual: u64,
    },

    /// Storage call exceeded its deadline; the transaction was rolled back
    #[error("Storage timeout: {0}")]
    Timeout(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any other backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding of metadata or scope failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DataFlagError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Timeout(_))
    }

    /// Process exit status for this error kind at the command boundary
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnknownType(_) => 2,
            Self::DuplicateType(_) => 3,
            Self::InvalidInterval { .. } => 4,
            Self::NotFound(_) => 5,
            Self::InvalidTransition { .. } => 6,
            Self::InvalidState { .. } => 7,
            Self::Conflict { .. } => 8,
            Self::Timeout(_) => 9,
            Self::Configuration(_) => 10,
            Self::UnknownRevision(_) => 11,
            Self::DuplicateRevision(_) => 12,
            Self::Storage(_) | Self::Serialization(_) => 1,
        }
    }
}

impl From<rusqlite::Error> for DataFlagError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                DataFlagError::Timeout(err.to_string())
            }
            _ => DataFlagError::Storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataFlagError {
    fn from(err: serde_json::Error) -> Self {
        DataFlagError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_identifiers() {
        let err = DataFlagError::InvalidState {
            id: FlagId(7),
            status: FlagStatus::Active,
            reviewer: "alice".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("alice"));
        assert!(msg.contains("active"));
    }

    #[test]
    fn retryable_kinds() {
        let conflict = DataFlagError::Conflict {
            id: FlagId(1),
            expected: 0,
            actual: 1,
        };
        assert!(conflict.is_retryable());
        assert!(DataFlagError::Timeout("busy".into()).is_retryable());
        assert!(!DataFlagError::NotFound(FlagId(1)).is_retryable());
    }

    #[test]
    fn exit_codes_are_nonzero() {
        let errors = [
            DataFlagError::UnknownType("x".into()),
            DataFlagError::Configuration("bad".into()),
            DataFlagError::Storage("io".into()),
        ];
        for err in &errors {
            assert_ne!(err.exit_code(), 0);
        }
    }

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let id = FlagId(1);
        let errors = [
            DataFlagError::UnknownType("x".into()),
            DataFlagError::DuplicateType("x".into()),
            DataFlagError::InvalidInterval { start: 1.0, end: Some(0.0) },
            DataFlagError::NotFound(id),
            DataFlagError::InvalidTransition {
                id,
                from: FlagStatus::Rejected,
                to: FlagStatus::Active,
            },
            DataFlagError::InvalidState {
                id,
                status: FlagStatus::Active,
                reviewer: "bob".into(),
            },
            DataFlagError::Conflict {
                id,
                expected: 0,
                actual: 1,
            },
            DataFlagError::Timeout("busy".into()),
            DataFlagError::Configuration("bad".into()),
            DataFlagError::UnknownRevision("rev".into()),
            DataFlagError::DuplicateRevision("rev".into()),
            DataFlagError::Storage("io".into()),
        ];
        let codes: std::collections::BTreeSet<u8> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn busy_sqlite_maps_to_timeout() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DataFlagError::from(err), DataFlagError::Timeout(_)));
    }
}
