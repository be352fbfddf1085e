//! Zapship background worker.
//!
//! Runs the two interval sweeps (tracking poll, automation dispatch) against
//! every connected tenant session. The WhatsApp session layer registers its
//! gateways in the shared `SessionRegistry`; until it does, the sweeps idle.
//! Run with: DATABASE_URL=postgres://... zapship-worker

use anyhow::Context;
use std::sync::Arc;

use zapship_core::{AppConfig, NoOpDispatchObserver};
use zapship_db::{
    AuditLogRepository, AutomationRepository, HistoryRepository, IntegrationRepository,
    OrderRepository,
};
use zapship_services::{AutomationDispatcher, SessionRegistry, TrackingClient, TrackingPollService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let pool = zapship_db::connect(&config)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let orders = Arc::new(OrderRepository::new(pool.clone()));
    let automations = Arc::new(AutomationRepository::new(pool.clone()));
    let history = Arc::new(HistoryRepository::new(pool.clone()));
    let audit = Arc::new(AuditLogRepository::new(pool.clone()));
    let integrations = Arc::new(IntegrationRepository::new(pool));

    let sessions = SessionRegistry::new();
    let observer = Arc::new(NoOpDispatchObserver);

    let dispatcher = Arc::new(AutomationDispatcher::new(
        orders.clone(),
        automations,
        history,
        audit.clone(),
        sessions.clone(),
        observer.clone(),
        &config,
    ));

    let tracker = Arc::new(TrackingClient::new(config.tracking_api_url.clone()));
    let tracking = Arc::new(TrackingPollService::new(
        orders,
        integrations,
        audit,
        tracker,
        sessions,
        observer,
        &config,
    ));

    tracing::info!("Starting sweeps");
    let dispatcher_handle = dispatcher.start();
    let tracking_handle = tracking.start();

    tokio::select! {
        result = dispatcher_handle => result.context("Automation sweep task ended")?,
        result = tracking_handle => result.context("Tracking sweep task ended")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
