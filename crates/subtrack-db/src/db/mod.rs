//! Database repositories for data access layer
//!
//! Each store is a trait so the services can run against PostgreSQL in
//! production and against the in-memory implementations in tests.
//
// Subscription records
pub mod subscription;
//
// Notification dedup ledger
pub mod ledger;
//
// Key/value application settings
pub mod settings;
//
// In-memory stores
pub mod memory;

pub use ledger::{NotificationLedger, PostgresNotificationLedger};
pub use memory::{
    InMemoryNotificationLedger, InMemorySettingsRepository, InMemorySubscriptionRepository,
};
pub use settings::{PostgresSettingsRepository, SettingsRepository};
pub use subscription::{PostgresSubscriptionRepository, SubscriptionRepository};
