//! Unified error handling for the data-access layer.
//!
//! Three kinds of failure reach callers:
//! - invalid arguments (empty sequence names, empty raw SQL)
//! - invalid state (a second transaction while one is open)
//! - execution failures coming back from sea-orm, optionally wrapped with context

use sea_orm::DbErr;
use thiserror::Error;

/// Data-access error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Execution failures
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Failed to get next value for sequence '{name}'")]
    Sequence {
        name: String,
        #[source]
        source: DbErr,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Stable error code for logs and callers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Sequence { .. } => "SEQUENCE_ERROR",
            AppError::Cancelled => "CANCELLED",
        }
    }

    /// Whether the error came back from the database rather than from the caller
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Sequence { .. } | AppError::Cancelled
        )
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AppError::InvalidState(msg.into())
    }

    pub fn sequence(name: impl Into<String>, source: DbErr) -> Self {
        AppError::Sequence {
            name: name.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(AppError::invalid_argument("x").code(), "INVALID_ARGUMENT");
        assert_eq!(AppError::invalid_state("x").code(), "INVALID_STATE");
        assert_eq!(AppError::Cancelled.code(), "CANCELLED");
        assert_eq!(
            AppError::from(DbErr::Custom("boom".into())).code(),
            "DATABASE_ERROR"
        );
    }

    #[test]
    fn test_sequence_error_reports_name_and_keeps_source() {
        let err = AppError::sequence("order_seq", DbErr::Custom("relation missing".into()));

        assert_eq!(
            err.to_string(),
            "Failed to get next value for sequence 'order_seq'"
        );
        assert!(err.source().is_some());
        assert!(err.is_execution_failure());
    }

    #[test]
    fn test_caller_errors_are_not_execution_failures() {
        assert!(!AppError::invalid_argument("empty").is_execution_failure());
        assert!(!AppError::invalid_state("open").is_execution_failure());
    }
}
