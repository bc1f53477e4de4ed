//! Subtrack Infrastructure Library
//!
//! Shared infrastructure for the Subtrack binaries:
//! - Telemetry initialization
//! - Notification channels (log-only and webhook push)

pub mod notify;
pub mod telemetry;

pub use notify::{
    create_notification_channel, TracingNotificationChannel, WebhookNotificationChannel,
};
pub use telemetry::{init_telemetry, shutdown_telemetry};
