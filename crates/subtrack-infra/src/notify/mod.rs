//! Notification channels
//!
//! `WebhookNotificationChannel` posts each reminder as JSON to a push gateway.
//! `TracingNotificationChannel` only logs, for local runs without a gateway.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use subtrack_core::models::{NotificationPriority, PaymentReminder};
use subtrack_core::{AppError, Config, NotificationChannel};

/// Header carrying [`PaymentReminder::idempotency_key`]. Unique per billing period.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Logs reminders instead of delivering them
#[derive(Clone, Default)]
pub struct TracingNotificationChannel;

#[async_trait]
impl NotificationChannel for TracingNotificationChannel {
    async fn deliver(&self, reminder: &PaymentReminder) -> Result<(), AppError> {
        tracing::info!(
            dedupe_key = %reminder.dedupe_key,
            due_date = %reminder.due_date,
            title = %reminder.title,
            body = %reminder.body,
            priority = ?reminder.priority,
            "Payment reminder"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    dedupe_key: &'a str,
    title: &'a str,
    body: &'a str,
    priority: NotificationPriority,
    subscription_id: i64,
    milestone_days: i64,
    due_date: DateTime<Utc>,
}

impl<'a> From<&'a PaymentReminder> for WebhookPayload<'a> {
    fn from(reminder: &'a PaymentReminder) -> Self {
        Self {
            dedupe_key: &reminder.dedupe_key,
            title: &reminder.title,
            body: &reminder.body,
            priority: reminder.priority,
            subscription_id: reminder.subscription_id,
            milestone_days: reminder.milestone.days(),
            due_date: reminder.due_date,
        }
    }
}

/// Delivers reminders by POSTing JSON to a configured URL
#[derive(Clone)]
pub struct WebhookNotificationChannel {
    client: Client,
    url: String,
}

impl WebhookNotificationChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotificationChannel {
    #[tracing::instrument(skip(self, reminder), fields(http.url = %self.url, dedupe_key = %reminder.dedupe_key))]
    async fn deliver(&self, reminder: &PaymentReminder) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .header(IDEMPOTENCY_KEY_HEADER, reminder.idempotency_key())
            .json(&WebhookPayload::from(reminder))
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Notification(format!(
                "webhook returned {}: {}",
                status, error_text
            )));
        }

        tracing::debug!(status = status.as_u16(), "Reminder delivered to webhook");
        Ok(())
    }
}

/// Build the channel selected by configuration: webhook when a URL is set, log-only otherwise.
pub fn create_notification_channel(config: &Config) -> anyhow::Result<Arc<dyn NotificationChannel>> {
    match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Initializing webhook notification channel");
            let channel = WebhookNotificationChannel::new(
                url.clone(),
                Duration::from_secs(config.notify_webhook_timeout_seconds),
            )?;
            Ok(Arc::new(channel))
        }
        None => {
            tracing::info!("No NOTIFY_WEBHOOK_URL set, reminders will only be logged");
            Ok(Arc::new(TracingNotificationChannel))
        }
    }
}
