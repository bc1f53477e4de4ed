//! User-facing subscription actions
//!
//! Create, edit, cancel and delete records, keeping the reminder ledger in
//! step with the record store.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use subtrack_core::constants::UPCOMING_WINDOW_DAYS;
use subtrack_core::models::{
    NewSubscription, SpendingSummary, Subscription, UpcomingPayment, UpdateSubscription,
};
use subtrack_core::AppError;
use subtrack_db::{NotificationLedger, SubscriptionRepository};
use validator::Validate;

use crate::log::log_record_error;

#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn NotificationLedger>,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn NotificationLedger>,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
        }
    }

    #[tracing::instrument(skip(self, new), fields(subscription.name = %new.name))]
    pub async fn create(
        &self,
        new: NewSubscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let new = NewSubscription {
            name: new.name.trim().to_string(),
            ..new
        };
        new.validate()?;

        let subscription = self.subscriptions.insert(&new, now).await?;
        tracing::info!(
            subscription.id = subscription.id,
            billing_cycle = %subscription.billing_cycle,
            "Subscription created"
        );
        Ok(subscription)
    }

    /// Apply `changes` to an existing record.
    ///
    /// Changing the billing cycle or start date moves the billing period, so
    /// the record's ledger entries are cleared first. If that fails the record
    /// is not touched.
    #[tracing::instrument(skip(self, changes), fields(subscription.id = %id))]
    pub async fn update(
        &self,
        id: i64,
        changes: UpdateSubscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        if changes.is_empty() {
            return Err(AppError::InvalidInput("No changes supplied".to_string()));
        }
        changes.validate()?;

        let existing = self.get(id).await?;
        let updated = existing.with_changes(&changes, now);
        updated.validate()?;

        if updated.billing_cycle != existing.billing_cycle
            || updated.start_date != existing.start_date
        {
            self.ledger.clear_all_for_subscription(id).await?;
        }
        let saved = self.subscriptions.update(&updated).await?;

        tracing::info!(subscription.id = id, "Subscription updated");
        Ok(saved)
    }

    /// Active → Cancelled, stamped with `now`.
    #[tracing::instrument(skip(self), fields(subscription.id = %id))]
    pub async fn cancel(&self, id: i64, now: DateTime<Utc>) -> Result<Subscription, AppError> {
        let existing = self.get(id).await?;
        let cancelled = existing.cancelled(now)?;
        let saved = self.subscriptions.update(&cancelled).await?;
        tracing::info!(subscription.id = id, "Subscription cancelled");
        Ok(saved)
    }

    /// Delete the record and its ledger entries.
    ///
    /// The ledger is cleared even when no record was found, so a retry after a
    /// failed clear still leaves nothing behind for a future record with the
    /// same id.
    #[tracing::instrument(skip(self), fields(subscription.id = %id))]
    pub async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let deleted = self.subscriptions.delete(id).await?;
        if let Err(e) = self.ledger.clear_all_for_subscription(id).await {
            tracing::error!(
                error = %e,
                subscription.id = id,
                "Failed to clear reminder ledger for deleted subscription"
            );
            return Err(e);
        }
        tracing::info!(subscription.id = id, deleted, "Subscription deleted");
        Ok(deleted)
    }

    pub async fn get(&self, id: i64) -> Result<Subscription, AppError> {
        self.subscriptions
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription {}", id)))
    }

    /// All records, most recently created first.
    pub async fn list(&self) -> Result<Vec<Subscription>, AppError> {
        self.subscriptions.list().await
    }

    pub async fn summary(&self) -> Result<SpendingSummary, AppError> {
        let subscriptions = self.subscriptions.list().await?;
        Ok(SpendingSummary::from_subscriptions(&subscriptions))
    }

    /// Active records charging within [`UPCOMING_WINDOW_DAYS`] of `now`, soonest first.
    ///
    /// Records whose dates cannot be computed are logged and left out.
    pub async fn upcoming(&self, now: DateTime<Utc>) -> Result<Vec<UpcomingPayment>, AppError> {
        let snapshot = self.subscriptions.list_active().await?;
        let mut upcoming = Vec::new();

        for subscription in snapshot {
            let due = subscription.next_billing_date(now).and_then(|next| {
                Ok(next.zip(subscription.remaining_days(now)?))
            });
            match due {
                Ok(Some((next_billing_date, remaining_days)))
                    if remaining_days <= UPCOMING_WINDOW_DAYS =>
                {
                    upcoming.push(UpcomingPayment {
                        subscription,
                        next_billing_date,
                        remaining_days,
                    });
                }
                Ok(_) => {}
                Err(e) => log_record_error(&e, subscription.id, "upcoming"),
            }
        }

        UpcomingPayment::sort(&mut upcoming);
        Ok(upcoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        active_subscription, cancelled_subscription, FlakyNotificationLedger,
        FlakySubscriptionRepository,
    };
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use subtrack_core::models::{BillingCycle, Milestone, SubscriptionStatus};
    use subtrack_core::ErrorMetadata;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap()
    }

    fn new_subscription(name: &str, price: Decimal, cycle: BillingCycle) -> NewSubscription {
        NewSubscription {
            name: name.to_string(),
            price,
            billing_cycle: cycle,
            start_date: now() - Duration::days(3),
        }
    }

    fn service() -> (SubscriptionService, FlakySubscriptionRepository, FlakyNotificationLedger) {
        let repo = FlakySubscriptionRepository::new();
        let ledger = FlakyNotificationLedger::new();
        let service = SubscriptionService::new(Arc::new(repo.clone()), Arc::new(ledger.clone()));
        (service, repo, ledger)
    }

    #[tokio::test]
    async fn create_trims_and_stores_active_record() {
        let (service, _, _) = service();
        let created = service
            .create(
                new_subscription("  Netflix  ", Decimal::new(1599, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(created.name, "Netflix");
        assert_eq!(created.status, SubscriptionStatus::Active);
        assert_eq!(created.created_at, now());
        assert_eq!(service.get(created.id).await.unwrap().name, "Netflix");
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let (service, repo, _) = service();
        for new in [
            new_subscription("N", Decimal::new(999, 2), BillingCycle::Monthly),
            new_subscription("   ", Decimal::new(999, 2), BillingCycle::Monthly),
            new_subscription(&"x".repeat(51), Decimal::new(999, 2), BillingCycle::Monthly),
            new_subscription("Netflix", Decimal::ZERO, BillingCycle::Monthly),
            new_subscription("Netflix", Decimal::new(10_001, 0), BillingCycle::Monthly),
            new_subscription("Netflix", Decimal::new(1, 3), BillingCycle::Monthly),
            new_subscription("Netflix", Decimal::new(9_999, 3), BillingCycle::Monthly),
        ] {
            let err = service.create(new, now()).await.unwrap_err();
            assert_eq!(err.error_code(), "INVALID_INPUT");
        }
        assert!(repo.inner().is_empty().await);
    }

    #[tokio::test]
    async fn cancel_stamps_cancelled_at_and_rejects_repeat() {
        let (service, _, _) = service();
        let created = service
            .create(
                new_subscription("Netflix", Decimal::new(999, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();

        let at = now() + Duration::hours(2);
        let cancelled = service.cancel(created.id, at).await.unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert_eq!(cancelled.cancelled_at, Some(at));
        assert_eq!(cancelled.start_date, created.start_date);

        let err = service.cancel(created.id, at).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn cancel_unknown_record_is_not_found() {
        let (service, _, _) = service();
        let err = service.cancel(99, now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_applies_edits_and_resets_ledger_on_schedule_change() {
        let (service, _, ledger) = service();
        let created = service
            .create(
                new_subscription("Netflix", Decimal::new(999, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();
        ledger.mark_sent(created.id, Milestone::OneWeek).await.unwrap();

        let renamed = service
            .update(
                created.id,
                UpdateSubscription {
                    name: Some("Netflix Premium".to_string()),
                    price: Some(Decimal::new(2299, 2)),
                    ..UpdateSubscription::default()
                },
                now(),
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Netflix Premium");
        assert_eq!(renamed.price, Decimal::new(2299, 2));
        assert!(ledger.has_sent(created.id, Milestone::OneWeek).await.unwrap());

        let moved = service
            .update(
                created.id,
                UpdateSubscription {
                    billing_cycle: Some(BillingCycle::Yearly),
                    ..UpdateSubscription::default()
                },
                now(),
            )
            .await
            .unwrap();
        assert_eq!(moved.billing_cycle, BillingCycle::Yearly);
        assert!(!ledger.has_sent(created.id, Milestone::OneWeek).await.unwrap());
    }

    #[tokio::test]
    async fn schedule_change_is_not_saved_when_ledger_cannot_be_cleared() {
        let (service, _, ledger) = service();
        let created = service
            .create(
                new_subscription("Netflix", Decimal::new(999, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();
        ledger.mark_sent(created.id, Milestone::ThreeDays).await.unwrap();
        ledger.set_writes_fail(true).await;

        let result = service
            .update(
                created.id,
                UpdateSubscription {
                    billing_cycle: Some(BillingCycle::Weekly),
                    start_date: Some(now()),
                    ..UpdateSubscription::default()
                },
                now() + Duration::hours(1),
            )
            .await;
        assert!(result.is_err());

        let stored = service.get(created.id).await.unwrap();
        assert_eq!(stored.billing_cycle, BillingCycle::Monthly);
        assert_eq!(stored.start_date, created.start_date);
        assert_eq!(stored.updated_at, created.updated_at);
        assert!(ledger.has_sent(created.id, Milestone::ThreeDays).await.unwrap());

        // Edits that keep the schedule never touch the ledger.
        let renamed = service
            .update(
                created.id,
                UpdateSubscription {
                    name: Some("Netflix HD".to_string()),
                    ..UpdateSubscription::default()
                },
                now(),
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Netflix HD");
    }

    #[tokio::test]
    async fn update_rejects_empty_and_invalid_edits() {
        let (service, _, _) = service();
        let created = service
            .create(
                new_subscription("Netflix", Decimal::new(999, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();

        let err = service
            .update(created.id, UpdateSubscription::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = service
            .update(
                created.id,
                UpdateSubscription {
                    price: Some(Decimal::new(-1, 0)),
                    ..UpdateSubscription::default()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_clears_ledger_even_when_id_is_reused() {
        let (service, _, ledger) = service();
        let first = service
            .create(
                new_subscription("Netflix", Decimal::new(999, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();
        ledger.mark_sent(first.id, Milestone::ThreeDays).await.unwrap();
        ledger.mark_sent(first.id, Milestone::Tomorrow).await.unwrap();

        assert!(service.delete(first.id).await.unwrap());

        let second = service
            .create(
                new_subscription("Spotify", Decimal::new(499, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        for milestone in Milestone::ALL {
            assert!(!ledger.has_sent(second.id, milestone).await.unwrap());
        }
    }

    #[tokio::test]
    async fn delete_reports_ledger_failure_and_retry_heals() {
        let (service, _, ledger) = service();
        let created = service
            .create(
                new_subscription("Netflix", Decimal::new(999, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();
        ledger.mark_sent(created.id, Milestone::Tomorrow).await.unwrap();
        ledger.set_writes_fail(true).await;

        assert!(service.delete(created.id).await.is_err());

        ledger.set_writes_fail(false).await;
        assert!(!service.delete(created.id).await.unwrap());
        assert!(!ledger.has_sent(created.id, Milestone::Tomorrow).await.unwrap());
    }

    #[tokio::test]
    async fn list_and_summary() {
        let (service, _, _) = service();
        let monthly = service
            .create(
                new_subscription("Netflix", Decimal::new(1500, 2), BillingCycle::Monthly),
                now(),
            )
            .await
            .unwrap();
        let yearly = service
            .create(
                new_subscription("Cloud", Decimal::new(120, 0), BillingCycle::Yearly),
                now() + Duration::seconds(1),
            )
            .await
            .unwrap();
        let cancelled = service
            .create(
                new_subscription("Hulu", Decimal::new(800, 2), BillingCycle::Monthly),
                now() + Duration::seconds(2),
            )
            .await
            .unwrap();
        service.cancel(cancelled.id, now()).await.unwrap();

        let listed: Vec<i64> = service.list().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![cancelled.id, yearly.id, monthly.id]);

        let summary = service.summary().await.unwrap();
        assert_eq!(summary.active_count, 2);
        assert_eq!(summary.cancelled_count, 1);
        assert_eq!(summary.monthly_total, Decimal::new(2500, 2));
    }

    #[tokio::test]
    async fn upcoming_lists_active_records_due_within_a_week() {
        let (service, repo, _) = service();
        let due = |id: i64, cycle: BillingCycle, next_in: Duration, created: i64| {
            let start = now() + next_in - cycle.period();
            Subscription {
                created_at: now() - Duration::days(400) + Duration::seconds(created),
                ..active_subscription(id, "Service", cycle, start)
            }
        };
        repo.put(due(1, BillingCycle::Monthly, Duration::days(7) + Duration::hours(2), 0))
            .await;
        repo.put(due(2, BillingCycle::Monthly, Duration::days(8), 0)).await;
        repo.put(due(3, BillingCycle::Weekly, Duration::hours(20), 30)).await;
        repo.put(due(4, BillingCycle::Yearly, Duration::hours(3), 10)).await;
        repo.put(due(5, BillingCycle::Quarterly, Duration::days(3), 0)).await;
        repo.put(cancelled_subscription(
            6,
            "Gone",
            BillingCycle::Weekly,
            now() - Duration::days(6),
            now() - Duration::days(1),
        ))
        .await;

        let upcoming = service.upcoming(now()).await.unwrap();

        let ids: Vec<i64> = upcoming.iter().map(|p| p.subscription.id).collect();
        assert_eq!(ids, vec![4, 3, 5, 1]);
        let days: Vec<i64> = upcoming.iter().map(|p| p.remaining_days).collect();
        assert_eq!(days, vec![0, 0, 3, 7]);
        assert_eq!(upcoming[2].next_billing_date, now() + Duration::days(3));
    }

    #[tokio::test]
    async fn upcoming_skips_records_whose_dates_overflow() {
        let (service, repo, _) = service();
        repo.put(active_subscription(
            1,
            "Ancient",
            BillingCycle::Weekly,
            now() - Duration::days(7 * 100_001),
        ))
        .await;
        repo.put(active_subscription(
            2,
            "Gym",
            BillingCycle::Weekly,
            now() - Duration::days(5),
        ))
        .await;

        let upcoming = service.upcoming(now()).await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].subscription.id, 2);
        assert_eq!(upcoming[0].remaining_days, 2);
    }
}
