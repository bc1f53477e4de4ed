//! Test doubles for the lifecycle services
//!
//! A recording notification channel and wrappers around the in-memory stores
//! that fail on demand, so engine tests can exercise per-record error paths
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use subtrack_core::models::{
    BillingCycle, Milestone, NewSubscription, PaymentReminder, Subscription, SubscriptionStatus,
};
use subtrack_core::{AppError, NotificationChannel};
use subtrack_db::{
    InMemoryNotificationLedger, InMemorySubscriptionRepository, NotificationLedger,
    SettingsRepository, SubscriptionRepository,
};
use tokio::sync::Mutex;

/// Active record fixture with a fixed price.
pub fn active_subscription(
    id: i64,
    name: &str,
    billing_cycle: BillingCycle,
    start_date: DateTime<Utc>,
) -> Subscription {
    Subscription {
        id,
        name: name.to_string(),
        price: Decimal::new(999, 2),
        billing_cycle,
        start_date,
        status: SubscriptionStatus::Active,
        cancelled_at: None,
        created_at: start_date,
        updated_at: start_date,
    }
}

/// Cancelled record fixture.
pub fn cancelled_subscription(
    id: i64,
    name: &str,
    billing_cycle: BillingCycle,
    start_date: DateTime<Utc>,
    cancelled_at: DateTime<Utc>,
) -> Subscription {
    Subscription {
        status: SubscriptionStatus::Cancelled,
        cancelled_at: Some(cancelled_at),
        updated_at: cancelled_at,
        ..active_subscription(id, name, billing_cycle, start_date)
    }
}

/// Channel that records every delivered reminder
#[derive(Clone, Default)]
pub struct RecordingChannel {
    delivered: Arc<Mutex<Vec<PaymentReminder>>>,
    failing: Arc<Mutex<HashSet<i64>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries for `subscription_id` fail until [`recover`](Self::recover) is called.
    pub async fn fail_for(&self, subscription_id: i64) {
        self.failing.lock().await.insert(subscription_id);
    }

    pub async fn recover(&self, subscription_id: i64) {
        self.failing.lock().await.remove(&subscription_id);
    }

    pub async fn delivered(&self) -> Vec<PaymentReminder> {
        self.delivered.lock().await.clone()
    }

    pub async fn delivered_keys(&self) -> Vec<String> {
        self.delivered
            .lock()
            .await
            .iter()
            .map(|r| r.dedupe_key.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn deliver(&self, reminder: &PaymentReminder) -> Result<(), AppError> {
        if self.failing.lock().await.contains(&reminder.subscription_id) {
            return Err(AppError::Notification(format!(
                "channel rejected {}",
                reminder.dedupe_key
            )));
        }
        self.delivered.lock().await.push(reminder.clone());
        Ok(())
    }
}

/// In-memory record store that can refuse snapshots or individual updates
#[derive(Clone, Default)]
pub struct FlakySubscriptionRepository {
    inner: InMemorySubscriptionRepository,
    failing_updates: Arc<Mutex<HashSet<i64>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl FlakySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemorySubscriptionRepository {
        &self.inner
    }

    pub async fn put(&self, subscription: Subscription) {
        self.inner.put(subscription).await;
    }

    pub async fn fail_updates_for(&self, id: i64) {
        self.failing_updates.lock().await.insert(id);
    }

    /// While unavailable, every list call fails.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().await = unavailable;
    }

    async fn check_available(&self) -> Result<(), AppError> {
        if *self.unavailable.lock().await {
            return Err(AppError::Internal("record store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for FlakySubscriptionRepository {
    async fn insert(
        &self,
        new: &NewSubscription,
        created_at: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        self.inner.insert(new, created_at).await
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, AppError> {
        if self.failing_updates.lock().await.contains(&subscription.id) {
            return Err(AppError::Internal(format!(
                "write rejected for subscription {}",
                subscription.id
            )));
        }
        self.inner.update(subscription).await
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        self.inner.delete(id).await
    }

    async fn get(&self, id: i64) -> Result<Option<Subscription>, AppError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Subscription>, AppError> {
        self.check_available().await?;
        self.inner.list().await
    }

    async fn list_active(&self) -> Result<Vec<Subscription>, AppError> {
        self.check_available().await?;
        self.inner.list_active().await
    }
}

/// In-memory ledger whose writes can be switched off
#[derive(Clone, Default)]
pub struct FlakyNotificationLedger {
    inner: InMemoryNotificationLedger,
    writes_fail: Arc<Mutex<bool>>,
}

impl FlakyNotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryNotificationLedger {
        &self.inner
    }

    pub async fn set_writes_fail(&self, fail: bool) {
        *self.writes_fail.lock().await = fail;
    }

    async fn check_writable(&self) -> Result<(), AppError> {
        if *self.writes_fail.lock().await {
            return Err(AppError::Internal("ledger write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationLedger for FlakyNotificationLedger {
    async fn has_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<bool, AppError> {
        self.inner.has_sent(subscription_id, milestone).await
    }

    async fn mark_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<(), AppError> {
        self.check_writable().await?;
        self.inner.mark_sent(subscription_id, milestone).await
    }

    async fn clear_all_for_subscription(&self, subscription_id: i64) -> Result<(), AppError> {
        self.check_writable().await?;
        self.inner.clear_all_for_subscription(subscription_id).await
    }
}

/// Settings store that cannot be read
#[derive(Clone, Default)]
pub struct UnavailableSettingsRepository;

#[async_trait]
impl SettingsRepository for UnavailableSettingsRepository {
    async fn is_notifications_enabled(&self) -> Result<bool, AppError> {
        Err(AppError::Internal("settings store unavailable".to_string()))
    }

    async fn set_notifications_enabled(&self, _enabled: bool) -> Result<(), AppError> {
        Err(AppError::Internal("settings store unavailable".to_string()))
    }
}
