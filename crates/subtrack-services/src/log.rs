use subtrack_core::{AppError, ErrorMetadata, LogLevel};

/// Log a failure on one record at the level its metadata asks for.
pub(crate) fn log_record_error(error: &AppError, subscription_id: i64, stage: &'static str) {
    let error_type = error.error_type();
    let error_code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, error_code, subscription.id = subscription_id, stage, "Subscription skipped");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, error_code, subscription.id = subscription_id, stage, "Subscription processing failed");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error.detailed_message(),
                error_type,
                error_code,
                subscription.id = subscription_id,
                stage,
                "Subscription processing failed"
            );
        }
    }
}
