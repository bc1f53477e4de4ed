//! Daily lifecycle job
//!
//! One run renews and expires subscriptions, then sends the reminders that
//! are due, both for the same `now`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use subtrack_db::SettingsRepository;
use subtrack_services::{
    ReminderDispatcher, ReminderReport, ReminderSettings, RenewalEngine, RenewalReport,
};

use crate::error::{JobError, JobResultExt};

/// Job entry point driven by the scheduler
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, now: DateTime<Utc>) -> Result<(), JobError>;
}

/// Outcome of one lifecycle run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub renewal: RenewalReport,
    pub reminders: ReminderReport,
}

#[derive(Clone)]
pub struct LifecycleJob {
    renewal: RenewalEngine,
    reminders: ReminderDispatcher,
    settings: Arc<dyn SettingsRepository>,
}

impl LifecycleJob {
    pub fn new(
        renewal: RenewalEngine,
        reminders: ReminderDispatcher,
        settings: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            renewal,
            reminders,
            settings,
        }
    }

    /// Run renewals then reminders for `now`.
    ///
    /// Failing to read settings or to take either snapshot is returned as a
    /// recoverable error. Per-record failures only show up in the report.
    #[tracing::instrument(skip(self), fields(job.name = "subscription_lifecycle"))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<JobReport, JobError> {
        let settings = ReminderSettings {
            notifications_enabled: self
                .settings
                .is_notifications_enabled()
                .await
                .recoverable("Failed to read notification settings")?,
        };

        let renewal = self
            .renewal
            .process_renewals(now)
            .await
            .recoverable("Failed to load subscriptions for renewal")?;

        let reminders = self
            .reminders
            .check_and_send_reminders(now, &settings)
            .await
            .recoverable("Failed to load subscriptions for reminders")?;

        tracing::info!(
            renewed = renewal.renewed,
            expired = renewal.expired,
            reminders_sent = reminders.sent,
            failed = renewal.failed + reminders.failed,
            notifications_enabled = settings.notifications_enabled,
            "Lifecycle job completed"
        );

        Ok(JobReport { renewal, reminders })
    }
}

#[async_trait]
impl ScheduledJob for LifecycleJob {
    fn name(&self) -> &'static str {
        "subscription_lifecycle"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<(), JobError> {
        self.run_once(now).await.map(|_| ())
    }
}
