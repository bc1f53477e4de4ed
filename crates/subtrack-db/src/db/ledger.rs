use sqlx::{PgPool, Postgres};
use subtrack_core::models::{LedgerKey, Milestone};
use subtrack_core::AppError;

/// Trait for the reminder dedup ledger
///
/// One entry per (subscription, milestone) that already fired in the current
/// billing period. Entries are dropped when the period rolls over and when the
/// subscription is deleted.
#[async_trait::async_trait]
pub trait NotificationLedger: Send + Sync {
    async fn has_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<bool, AppError>;

    async fn mark_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<(), AppError>;

    /// Remove the entries for every milestone of `subscription_id`.
    async fn clear_all_for_subscription(&self, subscription_id: i64) -> Result<(), AppError>;
}

/// Ledger backed by the `notification_ledger` table
#[derive(Clone)]
pub struct PostgresNotificationLedger {
    pool: PgPool,
}

impl PostgresNotificationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationLedger for PostgresNotificationLedger {
    #[tracing::instrument(skip(self), fields(db.table = "notification_ledger", db.operation = "select"))]
    async fn has_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<bool, AppError> {
        let key = LedgerKey::new(subscription_id, milestone);
        let sent = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM notification_ledger WHERE subscription_id = $1 AND milestone_days = $2)",
        )
        .bind(key.subscription_id)
        .bind(key.milestone_days)
        .fetch_one(&self.pool)
        .await?;

        Ok(sent)
    }

    #[tracing::instrument(skip(self), fields(db.table = "notification_ledger", db.operation = "insert"))]
    async fn mark_sent(&self, subscription_id: i64, milestone: Milestone) -> Result<(), AppError> {
        let key = LedgerKey::new(subscription_id, milestone);
        sqlx::query(
            r#"
            INSERT INTO notification_ledger (subscription_id, milestone_days)
            VALUES ($1, $2)
            ON CONFLICT (subscription_id, milestone_days) DO NOTHING
            "#,
        )
        .bind(key.subscription_id)
        .bind(key.milestone_days)
        .execute(&self.pool)
        .await?;

        tracing::debug!(ledger_key = %key, "Reminder recorded as sent");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "notification_ledger", db.operation = "delete"))]
    async fn clear_all_for_subscription(&self, subscription_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM notification_ledger WHERE subscription_id = $1")
            .bind(subscription_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            subscription_id,
            cleared = result.rows_affected(),
            "Cleared reminder ledger"
        );
        Ok(())
    }
}
