//! Error types module
//!
//! This module provides the core error type used throughout Subtrack. All
//! failures of the lifecycle engine, the repositories and the notification
//! channels are unified under the `AppError` enum.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be handled by callers
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Catch-up limit exceeded: more than {limit} billing periods elapsed")]
    CatchUpLimitExceeded { limit: u32 },

    #[error("Date out of range: {0}")]
    DateOutOfRange(String),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn app_error_static_metadata(err: &AppError) -> (&'static str, bool, LogLevel) {
    match err {
        AppError::Database(_) => ("DATABASE_ERROR", true, LogLevel::Error),
        AppError::InvalidRecord(_) => ("INVALID_RECORD", false, LogLevel::Warn),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        AppError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        AppError::InvalidStateTransition(_) => {
            ("INVALID_STATE_TRANSITION", false, LogLevel::Debug)
        }
        AppError::CatchUpLimitExceeded { .. } => ("CATCH_UP_LIMIT_EXCEEDED", false, LogLevel::Error),
        AppError::DateOutOfRange(_) => ("DATE_OUT_OF_RANGE", false, LogLevel::Error),
        AppError::Notification(_) => ("NOTIFICATION_ERROR", true, LogLevel::Warn),
        AppError::Internal(_) => ("INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => ("INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// Get the error type name
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::InvalidRecord(_) => "InvalidRecord",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidStateTransition(_) => "InvalidStateTransition",
            AppError::CatchUpLimitExceeded { .. } => "CatchUpLimitExceeded",
            AppError::DateOutOfRange(_) => "DateOutOfRange",
            AppError::Notification(_) => "Notification",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }
}
