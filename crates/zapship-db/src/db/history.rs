use sqlx::PgPool;

use zapship_core::models::NewHistoryEntry;
use zapship_core::AppError;

use super::store::HistoryStore;
use async_trait::async_trait;

/// Repository for the per-order conversation history.
#[derive(Clone)]
pub struct HistoryRepository {
    pool: PgPool,
}

impl HistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for HistoryRepository {
    /// Appends a row and refreshes the order's last-message columns in the
    /// same transaction so the inbox preview never drifts from the history.
    #[tracing::instrument(skip(self, entry), fields(db.table = "message_history", db.operation = "insert", db.record_id = %entry.order_id))]
    async fn append(&self, entry: NewHistoryEntry) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO message_history
                (order_id, tenant_id, body, kind, origin, media_url, media_kind)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.order_id)
        .bind(entry.tenant_id)
        .bind(&entry.body)
        .bind(&entry.kind)
        .bind(entry.origin)
        .bind(&entry.media_url)
        .bind(entry.media_kind)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE orders SET last_message = $1, last_message_at = now() \
             WHERE tenant_id = $2 AND id = $3",
        )
        .bind(&entry.body)
        .bind(entry.tenant_id)
        .bind(entry.order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
