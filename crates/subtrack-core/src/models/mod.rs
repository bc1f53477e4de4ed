//! Data models for the application
//!
//! Subscriptions, the billing-cycle catalog, payment reminders and the
//! spending summary derived from a record snapshot.

mod billing_cycle;
mod notification;
mod subscription;
mod summary;

pub use billing_cycle::*;
pub use notification::*;
pub use subscription::*;
pub use summary::*;
