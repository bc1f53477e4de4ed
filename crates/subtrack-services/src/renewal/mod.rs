//! Renewal engine
//!
//! Rolls active subscriptions forward to their current billing period and
//! expires cancelled ones whose last paid period has ended. Every step is a
//! function of `now`, so missed runs are caught up by the next one and a
//! repeated run for the same `now` changes nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use subtrack_core::models::{Subscription, SubscriptionStatus};
use subtrack_core::AppError;
use subtrack_db::{NotificationLedger, SubscriptionRepository};

use crate::log::log_record_error;

/// Counters for one renewal pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenewalReport {
    pub scanned: usize,
    pub renewed: usize,
    pub expired: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenewalOutcome {
    Renewed,
    Expired,
    Unchanged,
}

#[derive(Clone)]
pub struct RenewalEngine {
    subscriptions: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn NotificationLedger>,
}

impl RenewalEngine {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn NotificationLedger>,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
        }
    }

    /// Renew or expire every subscription that is due as of `now`.
    ///
    /// Only a failure to read the snapshot fails the call. Errors on a single
    /// record are logged and counted in `failed`, and the record is left as it
    /// was so the next pass picks it up again.
    #[tracing::instrument(skip(self), fields(job.stage = "renewal"))]
    pub async fn process_renewals(&self, now: DateTime<Utc>) -> Result<RenewalReport, AppError> {
        let snapshot = self.subscriptions.list().await?;
        let mut report = RenewalReport {
            scanned: snapshot.len(),
            ..RenewalReport::default()
        };

        for subscription in &snapshot {
            match self.process_one(subscription, now).await {
                Ok(RenewalOutcome::Renewed) => report.renewed += 1,
                Ok(RenewalOutcome::Expired) => report.expired += 1,
                Ok(RenewalOutcome::Unchanged) => {}
                Err(e) => {
                    report.failed += 1;
                    log_record_error(&e, subscription.id, "renewal");
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            renewed = report.renewed,
            expired = report.expired,
            failed = report.failed,
            "Renewal pass completed"
        );

        Ok(report)
    }

    async fn process_one(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, AppError> {
        subscription.validate()?;

        match subscription.status {
            SubscriptionStatus::Active => {
                let Some(renewed) = subscription.renewed(now)? else {
                    return Ok(RenewalOutcome::Unchanged);
                };
                // New period: every milestone may fire again. Cleared first so a
                // failure leaves the record stale and the next pass retries both.
                self.ledger
                    .clear_all_for_subscription(subscription.id)
                    .await?;
                self.subscriptions.update(&renewed).await?;
                tracing::debug!(
                    subscription.id = subscription.id,
                    previous_start = %subscription.start_date,
                    start_date = %renewed.start_date,
                    "Subscription renewed"
                );
                Ok(RenewalOutcome::Renewed)
            }
            SubscriptionStatus::Cancelled => {
                if !subscription.should_expire(now)? {
                    return Ok(RenewalOutcome::Unchanged);
                }
                let expired = subscription.expired(now)?;
                self.subscriptions.update(&expired).await?;
                tracing::debug!(
                    subscription.id = subscription.id,
                    cancelled_at = ?subscription.cancelled_at,
                    "Cancelled subscription expired"
                );
                Ok(RenewalOutcome::Expired)
            }
            SubscriptionStatus::Expired => Ok(RenewalOutcome::Unchanged),
        }
    }
}
