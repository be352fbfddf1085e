use sqlx::PgPool;
use uuid::Uuid;

use zapship_core::AppError;

use super::store::AuditLogStore;
use async_trait::async_trait;

/// Repository for the append-only audit trail of automated activity.
#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogStore for AuditLogRepository {
    #[tracing::instrument(skip(self, details), fields(db.table = "audit_logs", db.operation = "insert"))]
    async fn append(
        &self,
        tenant_id: Uuid,
        kind: &str,
        details: serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO audit_logs (tenant_id, kind, details) VALUES ($1, $2, $3)")
            .bind(tenant_id)
            .bind(kind)
            .bind(details)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
