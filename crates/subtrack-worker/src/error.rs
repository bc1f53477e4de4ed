//! Job execution error types
//!
//! A job failure is either recoverable (the scheduler retries it with
//! backoff) or unrecoverable (the run is abandoned until the next daily tick).

use std::fmt;
use subtrack_core::{AppError, ErrorMetadata};

#[derive(Debug)]
pub struct JobError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl JobError {
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    /// Check if this error is recoverable (should be retried)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for JobError {
    /// Plain errors are retried by default
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

impl From<AppError> for JobError {
    /// Recoverability follows the error's metadata
    fn from(err: AppError) -> Self {
        let recoverable = err.is_recoverable();
        Self {
            inner: anyhow::Error::new(err),
            recoverable,
        }
    }
}

/// Extension trait for Result to mark a stage failure as retryable, with context
pub trait JobResultExt<T> {
    /// Mark this result as recoverable on error, with context
    fn recoverable(self, context: &'static str) -> Result<T, JobError>;
}

impl<T, E> JobResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn recoverable(self, context: &'static str) -> Result<T, JobError> {
        self.map_err(|e| JobError::recoverable(anyhow::Error::new(e).context(context)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = JobError::unrecoverable(anyhow::anyhow!("Missing settings table"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Missing settings table"));
    }

    #[test]
    fn test_recoverable_error() {
        let err = JobError::recoverable(anyhow::anyhow!("Connection reset"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_from_anyhow() {
        let err: JobError = anyhow::anyhow!("Some error").into();
        assert!(err.is_recoverable(), "Default should be recoverable");
    }

    #[test]
    fn test_from_app_error_follows_metadata() {
        let err: JobError = AppError::Internal("pool timed out".to_string()).into();
        assert!(err.is_recoverable());

        let err: JobError = AppError::InvalidInput("bad".to_string()).into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_result_ext_adds_context() {
        let result: Result<(), AppError> = Err(AppError::Internal("boom".to_string()));
        let err = result.recoverable("Failed to read settings").unwrap_err();
        assert!(err.is_recoverable());
        let message = err.to_string();
        assert!(message.contains("Failed to read settings"));
        assert!(message.contains("boom"));
    }
}
