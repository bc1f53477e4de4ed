//! Subtrack Services Layer
//!
//! The subscription lifecycle: period renewal and expiry, payment-reminder
//! dispatch with per-period dedup, and the user-facing subscription actions.
//! Services depend on the repository traits only, so the same code runs
//! against PostgreSQL and the in-memory stores.

mod log;
pub mod reminders;
pub mod renewal;
pub mod subscriptions;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use reminders::{ReminderDispatcher, ReminderReport, ReminderSettings};
pub use renewal::{RenewalEngine, RenewalReport};
pub use subscriptions::SubscriptionService;
