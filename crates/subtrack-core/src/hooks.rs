//! Hooks and traits for external collaborators
//!
//! The lifecycle engine talks to the push-notification channel only through
//! this trait. Concrete channels live in `subtrack-infra`.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::PaymentReminder;

/// Delivery channel for payment reminders
///
/// Delivery is fire-and-forget from the engine's point of view: an error is
/// logged and the reminder is not recorded as sent, nothing else.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver a reminder. Implementations should collapse repeated deliveries
    /// that share the same [`PaymentReminder::idempotency_key`].
    async fn deliver(&self, reminder: &PaymentReminder) -> Result<(), AppError>;
}
