//! Persistence gateway for Zapship.
//!
//! Postgres repositories for orders, flows, automations, message history,
//! audit logs, and integration settings, plus the store traits the services
//! consume. Every query is tenant-scoped.

pub mod db;

pub use db::{
    AuditLogRepository, AutomationRepository, FlowRepository, HistoryRepository,
    IntegrationRepository, OrderRepository,
};
pub use db::{
    AuditLogStore, AutomationStore, FlowStore, HistoryStore, IntegrationStore, OrderStore,
};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use zapship_core::AppConfig;

/// Connects a pool with the configured limits.
pub async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
}
