//! Payment reminder dispatch
//!
//! Sends one reminder per (subscription, milestone) per billing period when an
//! active subscription is exactly 7, 3 or 1 whole days from its next charge.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use subtrack_core::models::{Milestone, PaymentReminder, Subscription};
use subtrack_core::{AppError, NotificationChannel};
use subtrack_db::{NotificationLedger, SubscriptionRepository};

use crate::log::log_record_error;

/// Global switches read once per job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderSettings {
    pub notifications_enabled: bool,
}

/// Counters for one reminder pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    /// Notifications were switched off; nothing was checked.
    pub disabled: bool,
    pub checked: usize,
    pub sent: usize,
    pub already_sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReminderOutcome {
    Sent,
    AlreadySent,
    NotDue,
}

#[derive(Clone)]
pub struct ReminderDispatcher {
    subscriptions: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn NotificationLedger>,
    channel: Arc<dyn NotificationChannel>,
}

impl ReminderDispatcher {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn NotificationLedger>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            channel,
        }
    }

    /// Deliver every reminder due as of `now` that has not fired this period.
    ///
    /// Run after the renewal pass for the same `now`. A delivery that fails is
    /// not recorded in the ledger, so the next pass tries again.
    #[tracing::instrument(skip(self), fields(job.stage = "reminders"))]
    pub async fn check_and_send_reminders(
        &self,
        now: DateTime<Utc>,
        settings: &ReminderSettings,
    ) -> Result<ReminderReport, AppError> {
        if !settings.notifications_enabled {
            tracing::debug!("Notifications disabled, skipping reminder pass");
            return Ok(ReminderReport {
                disabled: true,
                ..ReminderReport::default()
            });
        }

        let snapshot = self.subscriptions.list_active().await?;
        let mut report = ReminderReport::default();

        for subscription in &snapshot {
            report.checked += 1;
            match self.remind_one(subscription, now).await {
                Ok(ReminderOutcome::Sent) => report.sent += 1,
                Ok(ReminderOutcome::AlreadySent) => report.already_sent += 1,
                Ok(ReminderOutcome::NotDue) => {}
                Err(e) => {
                    report.failed += 1;
                    log_record_error(&e, subscription.id, "reminders");
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            sent = report.sent,
            already_sent = report.already_sent,
            failed = report.failed,
            "Reminder pass completed"
        );

        Ok(report)
    }

    async fn remind_one(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<ReminderOutcome, AppError> {
        subscription.validate()?;

        let Some(remaining_days) = subscription.remaining_days(now)? else {
            return Ok(ReminderOutcome::NotDue);
        };
        let Some(milestone) = Milestone::from_remaining_days(remaining_days) else {
            return Ok(ReminderOutcome::NotDue);
        };

        if self.ledger.has_sent(subscription.id, milestone).await? {
            return Ok(ReminderOutcome::AlreadySent);
        }

        let Some(due_date) = subscription.next_billing_date(now)? else {
            return Ok(ReminderOutcome::NotDue);
        };
        let reminder = PaymentReminder::for_subscription(subscription, milestone, due_date);
        self.channel.deliver(&reminder).await?;
        self.ledger.mark_sent(subscription.id, milestone).await?;

        tracing::info!(
            subscription.id = subscription.id,
            milestone = %milestone,
            dedupe_key = %reminder.dedupe_key,
            due_date = %reminder.due_date,
            "Payment reminder sent"
        );
        Ok(ReminderOutcome::Sent)
    }
}
