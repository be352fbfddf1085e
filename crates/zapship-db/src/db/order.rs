use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use zapship_core::models::{NewOrder, Order, TrackingUpdate};
use zapship_core::AppError;

use super::store::OrderStore;
use async_trait::async_trait;

const ORDER_COLUMNS: &str = "id, tenant_id, name, phone, email, product, tracking_code, notes, \
     internal_status, last_dispatched_trigger, last_location, last_update, origin_location, \
     destination_location, last_event_description, posted_at, profile_pic_url, last_message, \
     last_message_at, unread_count, check_count, last_checked_at, status_changed_at, created_at";

/// Repository for tracked orders/contacts.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a single order by ID (tenant-scoped).
    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<Postgres, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "select"))]
    async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Order>, AppError> {
        let orders = sqlx::query_as::<Postgres, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "select"))]
    async fn find_by_phone(
        &self,
        tenant_id: Uuid,
        phone: &str,
    ) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<Postgres, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 AND phone = $2"
        ))
        .bind(tenant_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    #[tracing::instrument(skip(self, order), fields(db.table = "orders", db.operation = "insert"))]
    async fn create(&self, tenant_id: Uuid, order: NewOrder) -> Result<Order, AppError> {
        if order.name.is_empty() || order.phone.is_empty() {
            return Err(AppError::InvalidInput(
                "Order requires a name and a normalized phone".to_string(),
            ));
        }

        let created = sqlx::query_as::<Postgres, Order>(&format!(
            r#"
            INSERT INTO orders
                (tenant_id, name, phone, email, product, tracking_code, notes, profile_pic_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(&order.name)
        .bind(&order.phone)
        .bind(&order.email)
        .bind(&order.product)
        .bind(&order.tracking_code)
        .bind(&order.notes)
        .bind(&order.profile_pic_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "update", db.record_id = %order_id))]
    async fn set_dispatch_marker(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        trigger: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE orders SET last_dispatched_trigger = $1 WHERE tenant_id = $2 AND id = $3",
        )
        .bind(trigger)
        .bind(tenant_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "update", db.record_id = %order_id))]
    async fn record_check(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        checked_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE orders SET last_checked_at = $1, check_count = check_count + 1 \
             WHERE tenant_id = $2 AND id = $3",
        )
        .bind(checked_at)
        .bind(tenant_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "orders", db.operation = "update", db.record_id = %order_id))]
    async fn apply_tracking_update(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        update: &TrackingUpdate,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE orders SET
                internal_status = $1,
                last_location = $2,
                last_update = $3,
                origin_location = $4,
                destination_location = $5,
                last_event_description = $6,
                status_changed_at = $7
            WHERE tenant_id = $8 AND id = $9
            "#,
        )
        .bind(&update.status)
        .bind(&update.location)
        .bind(&update.last_update)
        .bind(&update.origin_location)
        .bind(&update.destination_location)
        .bind(&update.last_event_description)
        .bind(changed_at)
        .bind(tenant_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "update", db.record_id = %order_id))]
    async fn increment_unread(&self, tenant_id: Uuid, order_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE orders SET unread_count = unread_count + 1 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "orders", db.operation = "update", db.record_id = %order_id))]
    async fn mark_read(&self, tenant_id: Uuid, order_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE orders SET unread_count = 0 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
