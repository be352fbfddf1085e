//! Store traits consumed by the services.
//!
//! The repositories in this crate are the Postgres implementations; tests use
//! in-memory mocks. Traits stay shape-agnostic: no sqlx types leak through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use zapship_core::models::{
    AutomationSettings, Flow, FlowNode, NewHistoryEntry, NewOrder, NodeOption, Order,
    TrackingUpdate, UserFlowState,
};
use zapship_core::AppError;

/// Orders: reads for the sweeps, plus the narrow field updates the core is
/// allowed to make (dispatch marker, tracking bookkeeping, unread counters).
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Order>, AppError>;

    async fn find_by_phone(&self, tenant_id: Uuid, phone: &str)
        -> Result<Option<Order>, AppError>;

    async fn create(&self, tenant_id: Uuid, order: NewOrder) -> Result<Order, AppError>;

    /// Writes the idempotency marker after a successful dispatch.
    async fn set_dispatch_marker(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        trigger: &str,
    ) -> Result<(), AppError>;

    /// Bumps check bookkeeping after a tracking API call, whatever its outcome.
    async fn record_check(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        checked_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Applies a status change from the tracking API, stamping `status_changed_at`.
    async fn apply_tracking_update(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        update: &TrackingUpdate,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn increment_unread(&self, tenant_id: Uuid, order_id: Uuid) -> Result<(), AppError>;

    async fn mark_read(&self, tenant_id: Uuid, order_id: Uuid) -> Result<(), AppError>;
}

/// Flow definitions and per-contact conversation state.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn find_active_by_trigger(
        &self,
        tenant_id: Uuid,
        keyword: &str,
    ) -> Result<Option<Flow>, AppError>;

    /// Explicitly flagged start node, else the first node by position.
    async fn start_node(&self, flow_id: Uuid) -> Result<Option<FlowNode>, AppError>;

    async fn node(&self, node_id: Uuid) -> Result<Option<FlowNode>, AppError>;

    /// Options of a question node, ordered by position.
    async fn options(&self, node_id: Uuid) -> Result<Vec<NodeOption>, AppError>;

    async fn state_for_order(&self, order_id: Uuid) -> Result<Option<UserFlowState>, AppError>;

    async fn create_state(
        &self,
        order_id: Uuid,
        flow_id: Uuid,
        node_id: Uuid,
    ) -> Result<(), AppError>;

    async fn update_state_node(&self, order_id: Uuid, node_id: Uuid) -> Result<(), AppError>;

    async fn delete_state(&self, order_id: Uuid) -> Result<(), AppError>;
}

/// Automation settings per trigger key, merged over the compiled-in defaults.
#[async_trait]
pub trait AutomationStore: Send + Sync {
    async fn settings_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<HashMap<String, AutomationSettings>, AppError>;
}

/// Append-only conversation history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: NewHistoryEntry) -> Result<(), AppError>;
}

/// Append-only audit trail of automated activity.
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append(
        &self,
        tenant_id: Uuid,
        kind: &str,
        details: serde_json::Value,
    ) -> Result<(), AppError>;
}

/// Per-tenant third-party integration settings.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn tracking_api_key(&self, tenant_id: Uuid) -> Result<Option<String>, AppError>;
}
