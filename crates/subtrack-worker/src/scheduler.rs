//! Daily scheduler for the lifecycle job.
//!
//! Shutdown: [`LifecycleScheduler::shutdown`] signals the loop and waits for it
//! to return. A run in progress is finished first; pending retries are dropped.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use subtrack_core::Config;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use crate::job::ScheduledJob;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum delay in seconds before retrying a failed run. Caps exponential backoff.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 3600;

/// Backoff before retry number `attempt` (0-based): `base * 2^attempt`, capped.
#[inline]
pub(crate) fn compute_retry_backoff_seconds(base_secs: u64, attempt: u32) -> u64 {
    base_secs
        .saturating_mul(2_u64.saturating_pow(attempt))
        .min(MAX_RETRY_BACKOFF_SECS)
}

/// Time from `now` until the next `hour_utc`:00:00. Zero when `now` is exactly on it.
pub(crate) fn delay_until_next_run(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let Some(today) = now.date_naive().and_hms_opt(hour_utc.min(23), 0, 0) else {
        return Duration::ZERO;
    };
    let today = today.and_utc();
    let next = if today >= now {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[derive(Clone, Debug)]
pub struct LifecycleSchedulerConfig {
    pub run_hour_utc: u32,
    /// Extra attempts after a recoverable failure
    pub max_retries: u32,
    pub retry_backoff_secs: u64,
}

impl Default for LifecycleSchedulerConfig {
    fn default() -> Self {
        Self {
            run_hour_utc: 9,
            max_retries: 3,
            retry_backoff_secs: 60,
        }
    }
}

impl From<&Config> for LifecycleSchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            run_hour_utc: config.renewal_run_hour_utc,
            max_retries: config.job_max_retries,
            retry_backoff_secs: config.job_retry_backoff_secs,
        }
    }
}

pub struct LifecycleScheduler {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl LifecycleScheduler {
    /// Spawn the background loop. The first run fires at the next configured hour.
    pub fn start(job: Arc<dyn ScheduledJob>, config: LifecycleSchedulerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            Self::run_loop(job, config, shutdown_rx).await;
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Lifecycle scheduler task ended abnormally");
        }
    }

    async fn run_loop(
        job: Arc<dyn ScheduledJob>,
        config: LifecycleSchedulerConfig,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let initial_delay = delay_until_next_run(Utc::now(), config.run_hour_utc);
        tracing::info!(
            job = job.name(),
            run_hour_utc = config.run_hour_utc,
            initial_delay_secs = initial_delay.as_secs(),
            max_retries = config.max_retries,
            "Lifecycle scheduler started"
        );

        let mut ticker = interval_at(Instant::now() + initial_delay, DAY);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Lifecycle scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if !Self::run_with_retry(job.as_ref(), &config, &mut shutdown_rx).await {
                        tracing::info!("Lifecycle scheduler shutting down during retry");
                        break;
                    }
                }
            }
        }

        tracing::info!("Lifecycle scheduler stopped");
    }

    /// Run the job, retrying recoverable failures. Returns `false` when shutdown
    /// was requested while waiting to retry.
    pub(crate) async fn run_with_retry(
        job: &dyn ScheduledJob,
        config: &LifecycleSchedulerConfig,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> bool {
        let mut attempt: u32 = 0;
        loop {
            match job.run(Utc::now()).await {
                Ok(()) => return true,
                Err(e) => {
                    let will_retry = e.is_recoverable() && attempt < config.max_retries;
                    tracing::error!(
                        job = job.name(),
                        error = %e,
                        attempt,
                        max_retries = config.max_retries,
                        unrecoverable = !e.is_recoverable(),
                        will_retry,
                        "Lifecycle job failed"
                    );
                    if !will_retry {
                        return true;
                    }

                    let backoff = compute_retry_backoff_seconds(config.retry_backoff_secs, attempt);
                    tokio::select! {
                        _ = shutdown_rx.recv() => return false,
                        _ = sleep(Duration::from_secs(backoff)) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}
