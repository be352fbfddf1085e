use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use zapship_core::models::{Flow, FlowNode, NodeOption, UserFlowState};
use zapship_core::AppError;

use super::store::FlowStore;
use async_trait::async_trait;

/// Repository for flow definitions and per-contact conversation state.
#[derive(Clone)]
pub struct FlowRepository {
    pool: PgPool,
}

impl FlowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlowStore for FlowRepository {
    #[tracing::instrument(skip(self), fields(db.table = "flows", db.operation = "select"))]
    async fn find_active_by_trigger(
        &self,
        tenant_id: Uuid,
        keyword: &str,
    ) -> Result<Option<Flow>, AppError> {
        // Exact match, same as option labels: the keyword is part of the
        // authored conversation contract.
        let flow = sqlx::query_as::<Postgres, Flow>(
            "SELECT id, tenant_id, name, trigger_keyword, active, created_at \
             FROM flows WHERE tenant_id = $1 AND active AND trigger_keyword = $2",
        )
        .bind(tenant_id)
        .bind(keyword)
        .fetch_optional(&self.pool)
        .await?;

        Ok(flow)
    }

    #[tracing::instrument(skip(self), fields(db.table = "flow_nodes", db.operation = "select"))]
    async fn start_node(&self, flow_id: Uuid) -> Result<Option<FlowNode>, AppError> {
        // Explicit start flag wins; otherwise fall back to the lowest position.
        let node = sqlx::query_as::<Postgres, FlowNode>(
            "SELECT id, flow_id, kind, content, is_start, position \
             FROM flow_nodes WHERE flow_id = $1 \
             ORDER BY is_start DESC, position ASC LIMIT 1",
        )
        .bind(flow_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(node)
    }

    #[tracing::instrument(skip(self), fields(db.table = "flow_nodes", db.operation = "select", db.record_id = %node_id))]
    async fn node(&self, node_id: Uuid) -> Result<Option<FlowNode>, AppError> {
        let node = sqlx::query_as::<Postgres, FlowNode>(
            "SELECT id, flow_id, kind, content, is_start, position \
             FROM flow_nodes WHERE id = $1",
        )
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(node)
    }

    #[tracing::instrument(skip(self), fields(db.table = "node_options", db.operation = "select"))]
    async fn options(&self, node_id: Uuid) -> Result<Vec<NodeOption>, AppError> {
        let options = sqlx::query_as::<Postgres, NodeOption>(
            "SELECT id, node_id, label, next_node_id, position \
             FROM node_options WHERE node_id = $1 ORDER BY position ASC",
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(options)
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_flow_states", db.operation = "select", db.record_id = %order_id))]
    async fn state_for_order(&self, order_id: Uuid) -> Result<Option<UserFlowState>, AppError> {
        let state = sqlx::query_as::<Postgres, UserFlowState>(
            "SELECT order_id, flow_id, node_id, updated_at \
             FROM user_flow_states WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_flow_states", db.operation = "upsert", db.record_id = %order_id))]
    async fn create_state(
        &self,
        order_id: Uuid,
        flow_id: Uuid,
        node_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_flow_states (order_id, flow_id, node_id, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (order_id)
            DO UPDATE SET flow_id = EXCLUDED.flow_id, node_id = EXCLUDED.node_id, updated_at = now()
            "#,
        )
        .bind(order_id)
        .bind(flow_id)
        .bind(node_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_flow_states", db.operation = "update", db.record_id = %order_id))]
    async fn update_state_node(&self, order_id: Uuid, node_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE user_flow_states SET node_id = $1, updated_at = now() WHERE order_id = $2",
        )
        .bind(node_id)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_flow_states", db.operation = "delete", db.record_id = %order_id))]
    async fn delete_state(&self, order_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_flow_states WHERE order_id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
