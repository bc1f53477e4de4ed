//! Shared wiring and helpers for the `subtrack` binary.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use subtrack_core::models::BillingCycle;
use subtrack_core::Config;
use subtrack_db::{
    NotificationLedger, PostgresNotificationLedger, PostgresSettingsRepository,
    PostgresSubscriptionRepository, SettingsRepository, SubscriptionRepository,
};
use subtrack_services::{ReminderDispatcher, RenewalEngine, SubscriptionService};
use subtrack_worker::LifecycleJob;

/// Services wired against one database pool
pub struct AppContext {
    pub subscriptions: SubscriptionService,
    pub settings: Arc<dyn SettingsRepository>,
    pub job: Arc<LifecycleJob>,
}

impl AppContext {
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let pool = subtrack_db::setup_database(config).await?;

        let repository: Arc<dyn SubscriptionRepository> =
            Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
        let ledger: Arc<dyn NotificationLedger> =
            Arc::new(PostgresNotificationLedger::new(pool.clone()));
        let settings: Arc<dyn SettingsRepository> = Arc::new(PostgresSettingsRepository::new(
            pool,
            config.notifications_enabled_default,
        ));
        let channel = subtrack_infra::create_notification_channel(config)?;

        let job = LifecycleJob::new(
            RenewalEngine::new(repository.clone(), ledger.clone()),
            ReminderDispatcher::new(repository.clone(), ledger.clone(), channel),
            settings.clone(),
        );

        Ok(Self {
            subscriptions: SubscriptionService::new(repository, ledger),
            settings,
            job: Arc::new(job),
        })
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid date '{}': expected YYYY-MM-DD or RFC 3339", input))
}

pub fn parse_billing_cycle(input: &str) -> Result<BillingCycle, String> {
    input.parse::<BillingCycle>().map_err(|e| e.to_string())
}
