use sqlx::PgPool;
use uuid::Uuid;

use zapship_core::AppError;

use super::store::IntegrationStore;
use async_trait::async_trait;

/// Repository for per-tenant third-party integration settings.
#[derive(Clone)]
pub struct IntegrationRepository {
    pool: PgPool,
}

impl IntegrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationStore for IntegrationRepository {
    #[tracing::instrument(skip(self), fields(db.table = "integration_configs", db.operation = "select"))]
    async fn tracking_api_key(&self, tenant_id: Uuid) -> Result<Option<String>, AppError> {
        let key: Option<(String,)> = sqlx::query_as(
            "SELECT tracking_api_key FROM integration_configs \
             WHERE tenant_id = $1 AND tracking_api_key IS NOT NULL",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key.map(|(k,)| k))
    }
}
