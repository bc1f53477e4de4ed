use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use subtrack_core::models::{NewSubscription, Subscription, SubscriptionStatus};
use subtrack_core::AppError;

const SUBSCRIPTION_COLUMNS: &str =
    "id, name, price, billing_cycle, start_date, status, cancelled_at, created_at, updated_at";

/// Trait for the subscription record store
///
/// `update` overwrites the whole record and is atomic per record. List
/// operations return snapshots: later writes are not reflected in a vector
/// that has already been returned.
#[async_trait::async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert an Active record built from `new`.
    async fn insert(
        &self,
        new: &NewSubscription,
        created_at: DateTime<Utc>,
    ) -> Result<Subscription, AppError>;

    /// Persist `subscription`; fails with `NotFound` when the id is unknown.
    async fn update(&self, subscription: &Subscription) -> Result<Subscription, AppError>;

    /// Remove the record. Returns `false` when nothing was deleted.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    async fn get(&self, id: i64) -> Result<Option<Subscription>, AppError>;

    /// All records, most recently created first.
    async fn list(&self) -> Result<Vec<Subscription>, AppError>;

    async fn list_active(&self) -> Result<Vec<Subscription>, AppError>;
}

/// Repository for subscription records in PostgreSQL
#[derive(Clone)]
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "subscriptions", db.operation = "insert"))]
    async fn insert(
        &self,
        new: &NewSubscription,
        created_at: DateTime<Utc>,
    ) -> Result<Subscription, AppError> {
        let subscription = sqlx::query_as::<Postgres, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (name, price, billing_cycle, start_date, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(new.name.trim())
        .bind(new.price)
        .bind(new.billing_cycle)
        .bind(new.start_date)
        .bind(SubscriptionStatus::Active)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    #[tracing::instrument(skip(self, subscription), fields(db.table = "subscriptions", db.operation = "update", db.record_id = subscription.id))]
    async fn update(&self, subscription: &Subscription) -> Result<Subscription, AppError> {
        let updated = sqlx::query_as::<Postgres, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET name = $2, price = $3, billing_cycle = $4, start_date = $5,
                status = $6, cancelled_at = $7, updated_at = $8
            WHERE id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription.id)
        .bind(&subscription.name)
        .bind(subscription.price)
        .bind(subscription.billing_cycle)
        .bind(subscription.start_date)
        .bind(subscription.status)
        .bind(subscription.cancelled_at)
        .bind(subscription.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::NotFound(format!("subscription {}", subscription.id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "subscriptions", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subscriptions", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: i64) -> Result<Option<Subscription>, AppError> {
        let subscription = sqlx::query_as::<Postgres, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subscriptions", db.operation = "select"))]
    async fn list(&self) -> Result<Vec<Subscription>, AppError> {
        let subscriptions = sqlx::query_as::<Postgres, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subscriptions", db.operation = "select"))]
    async fn list_active(&self) -> Result<Vec<Subscription>, AppError> {
        let subscriptions = sqlx::query_as::<Postgres, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE status = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(SubscriptionStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }
}
