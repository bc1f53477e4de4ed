//! Configuration module
//!
//! Runtime settings for the database, the daily lifecycle job and the
//! notification channel, read from the environment (and `.env` when present).

use std::env;

// Common constants
const MAX_CONNECTIONS: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const RENEWAL_RUN_HOUR_UTC: u32 = 9;
const JOB_MAX_RETRIES: u32 = 3;
const JOB_RETRY_BACKOFF_SECS: u64 = 60;
const NOTIFY_WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Reported by the settings store until the switch has been set explicitly.
    pub notifications_enabled_default: bool,
    /// Hour of day (UTC) at which the daily lifecycle job fires.
    pub renewal_run_hour_utc: u32,
    /// Extra attempts after a retryable job failure, before waiting for the next day.
    pub job_max_retries: u32,
    pub job_retry_backoff_secs: u64,
    pub notify_webhook_url: Option<String>,
    pub notify_webhook_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let database_url = lookup("SUBTRACK_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .ok_or_else(|| anyhow::anyhow!("SUBTRACK_DATABASE_URL or DATABASE_URL must be set"))?;

        let config = Config {
            environment,
            database_url,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: lookup("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            notifications_enabled_default: lookup("NOTIFICATIONS_ENABLED")
                .map(|s| s.trim().to_lowercase())
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            renewal_run_hour_utc: lookup("RENEWAL_RUN_HOUR_UTC")
                .map(|s| s.trim().parse::<u32>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("RENEWAL_RUN_HOUR_UTC must be a valid number"))?
                .unwrap_or(RENEWAL_RUN_HOUR_UTC),
            job_max_retries: lookup("JOB_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(JOB_MAX_RETRIES),
            job_retry_backoff_secs: lookup("JOB_RETRY_BACKOFF_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(JOB_RETRY_BACKOFF_SECS),
            notify_webhook_url: lookup("NOTIFY_WEBHOOK_URL").filter(|s| !s.trim().is_empty()),
            notify_webhook_timeout_seconds: lookup("NOTIFY_WEBHOOK_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(NOTIFY_WEBHOOK_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.renewal_run_hour_utc > 23 {
            return Err(anyhow::anyhow!(
                "RENEWAL_RUN_HOUR_UTC must be between 0 and 23, got {}",
                self.renewal_run_hour_utc
            ));
        }
        if self.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be greater than 0"));
        }
        if let Some(url) = &self.notify_webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "NOTIFY_WEBHOOK_URL must be an http(s) URL"
                ));
            }
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
