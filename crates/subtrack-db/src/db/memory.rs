//! In-memory stores
//!
//! Same contracts as the PostgreSQL repositories, kept in process memory.
//! Ids are assigned as `max(id) + 1`, so deleting the newest record lets the
//! next insert reuse its id.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use subtrack_core::models::{LedgerKey, Milestone, NewSubscription, Subscription, SubscriptionStatus};
use subtrack_core::AppError;
use tokio::sync::Mutex;

use super::ledger::NotificationLedger;
use super::settings::SettingsRepository;
use super::subscription::SubscriptionRepository;

#[derive(Clone, Default)]
pub struct InMemorySubscriptionRepository {
    records: Arc<Mutex<BTreeMap<i64, Subscription>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscription` as-is, replacing any record with the same id.
    pub async fn put(&self, subscription: Subscription) {
        self.records
            .lock()
            .await
            .insert(subscription.id, subscription);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

fn newest_first(mut subscriptions: Vec<Subscription>) -> Vec<Subscription> {
    subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    subscriptions
}

#[async_trait::async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert(
        &self,
        new: &NewSubscription,
        created_at: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let mut records = self.records.lock().await;
        let id = records.keys().next_back().map_or(1, |max| max + 1);
        let subscription = Subscription {
            id,
            name: new.name.trim().to_string(),
            price: new.price,
            billing_cycle: new.billing_cycle,
            start_date: new.start_date,
            status: SubscriptionStatus::Active,
            cancelled_at: None,
            created_at,
            updated_at: created_at,
        };
        records.insert(id, subscription.clone());
        Ok(subscription)
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, AppError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&subscription.id) {
            Some(existing) => {
                *existing = subscription.clone();
                Ok(subscription.clone())
            }
            None => Err(AppError::NotFound(format!(
                "subscription {}",
                subscription.id
            ))),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.records.lock().await.remove(&id).is_some())
    }

    async fn get(&self, id: i64) -> Result<Option<Subscription>, AppError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Subscription>, AppError> {
        let records = self.records.lock().await;
        Ok(newest_first(records.values().cloned().collect()))
    }

    async fn list_active(&self) -> Result<Vec<Subscription>, AppError> {
        let records = self.records.lock().await;
        Ok(newest_first(
            records.values().filter(|s| s.is_active()).cloned().collect(),
        ))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationLedger {
    entries: Arc<Mutex<HashMap<LedgerKey, bool>>>,
}

impl InMemoryNotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently marked as sent, rendered `notif_{id}_{days}` and sorted.
    pub async fn sent_keys(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, sent)| **sent)
            .map(|(key, _)| key.to_string())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl NotificationLedger for InMemoryNotificationLedger {
    async fn has_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<bool, AppError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(&LedgerKey::new(subscription_id, milestone))
            .copied()
            .unwrap_or(false))
    }

    async fn mark_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<(), AppError> {
        self.entries
            .lock()
            .await
            .insert(LedgerKey::new(subscription_id, milestone), true);
        Ok(())
    }

    async fn clear_all_for_subscription(&self, subscription_id: i64) -> Result<(), AppError> {
        let mut entries = self.entries.lock().await;
        for milestone in Milestone::ALL {
            entries.remove(&LedgerKey::new(subscription_id, milestone));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct InMemorySettingsRepository {
    notifications_enabled: Arc<Mutex<bool>>,
}

impl InMemorySettingsRepository {
    pub fn new(notifications_enabled: bool) -> Self {
        Self {
            notifications_enabled: Arc::new(Mutex::new(notifications_enabled)),
        }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn is_notifications_enabled(&self) -> Result<bool, AppError> {
        Ok(*self.notifications_enabled.lock().await)
    }

    async fn set_notifications_enabled(&self, enabled: bool) -> Result<(), AppError> {
        *self.notifications_enabled.lock().await = enabled;
        Ok(())
    }
}
