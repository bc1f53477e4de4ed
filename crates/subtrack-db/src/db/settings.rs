use sqlx::{PgPool, Postgres};
use subtrack_core::AppError;

pub(crate) const NOTIFICATIONS_ENABLED_KEY: &str = "notifications_enabled";

/// Trait for global application settings
#[async_trait::async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn is_notifications_enabled(&self) -> Result<bool, AppError>;

    async fn set_notifications_enabled(&self, enabled: bool) -> Result<(), AppError>;
}

/// Settings stored as key/boolean rows in `app_settings`
///
/// A key that has never been written reads as `default_notifications_enabled`.
#[derive(Clone)]
pub struct PostgresSettingsRepository {
    pool: PgPool,
    default_notifications_enabled: bool,
}

impl PostgresSettingsRepository {
    pub fn new(pool: PgPool, default_notifications_enabled: bool) -> Self {
        Self {
            pool,
            default_notifications_enabled,
        }
    }
}

#[async_trait::async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    #[tracing::instrument(skip(self), fields(db.table = "app_settings", db.operation = "select"))]
    async fn is_notifications_enabled(&self) -> Result<bool, AppError> {
        let value = sqlx::query_scalar::<Postgres, bool>(
            "SELECT bool_value FROM app_settings WHERE key = $1",
        )
        .bind(NOTIFICATIONS_ENABLED_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.unwrap_or(self.default_notifications_enabled))
    }

    #[tracing::instrument(skip(self), fields(db.table = "app_settings", db.operation = "upsert"))]
    async fn set_notifications_enabled(&self, enabled: bool) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, bool_value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET bool_value = EXCLUDED.bool_value, updated_at = NOW()
            "#,
        )
        .bind(NOTIFICATIONS_ENABLED_KEY)
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
