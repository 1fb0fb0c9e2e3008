//! Error types for TALLY operations

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Lookup failures. Callers route these to a "not found" experience and never retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Object type not found: {object_type}")]
    ObjectType { object_type: String },

    #[error("Report not found: {report_id}")]
    Report { report_id: Uuid },

    #[error("Record not found: {object_type} with id {record_id}")]
    Record {
        object_type: String,
        record_id: String,
    },
}

/// Malformed filter, sort, select or aggregation input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid operator {operator} on field {field}: {reason}")]
    InvalidOperator {
        field: String,
        operator: String,
        reason: String,
    },

    #[error("Invalid value for {field} ({operator}): {reason}")]
    InvalidValue {
        field: String,
        operator: String,
        reason: String,
    },
}

impl ValidationError {
    /// Shorthand for an unknown or unusable field.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_operator(
        field: impl Into<String>,
        operator: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidOperator {
            field: field.into(),
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        operator: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            operator: operator.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by the storage collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage call timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Flat classification of a [`TallyError`] for callers that only route on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidField,
    InvalidOperator,
    InvalidValue,
    StorageUnavailable,
    StorageTimeout,
    Config,
    Internal,
}

/// Master error type for all TALLY errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl TallyError {
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(ValidationError::InvalidField { .. }) => ErrorKind::InvalidField,
            Self::Validation(ValidationError::InvalidOperator { .. }) => {
                ErrorKind::InvalidOperator
            }
            Self::Validation(ValidationError::InvalidValue { .. }) => ErrorKind::InvalidValue,
            Self::Storage(StorageError::Unavailable { .. }) => ErrorKind::StorageUnavailable,
            Self::Storage(StorageError::Timeout { .. }) => ErrorKind::StorageTimeout,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// True for malformed caller input (InvalidField / InvalidOperator / InvalidValue).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for TALLY operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================
