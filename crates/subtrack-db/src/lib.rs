//! Subtrack persistence layer
//!
//! Repository traits for the three stores the lifecycle engine touches, with a
//! PostgreSQL implementation of each and an in-memory implementation used by
//! tests.

pub mod db;
pub mod setup;

pub use db::{
    InMemoryNotificationLedger, InMemorySettingsRepository, InMemorySubscriptionRepository,
    NotificationLedger, PostgresNotificationLedger, PostgresSettingsRepository,
    PostgresSubscriptionRepository, SettingsRepository, SubscriptionRepository,
};
pub use setup::setup_database;
