use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

use zapship_core::models::{Order, TrackingUpdate};
use zapship_core::{poll, status, AppConfig, AppError, DispatchObserver};
use zapship_db::{AuditLogStore, IntegrationStore, OrderStore};

use crate::session::SessionRegistry;
use crate::tracking::Tracker;

/// Periodic sweep that polls the tracking API for orders that are due.
///
/// Status writes land in the database only; the next automation sweep picks
/// the change up and decides whether to message the contact.
pub struct TrackingPollService {
    orders: Arc<dyn OrderStore>,
    integrations: Arc<dyn IntegrationStore>,
    audit: Arc<dyn AuditLogStore>,
    tracker: Arc<dyn Tracker>,
    sessions: SessionRegistry,
    observer: Arc<dyn DispatchObserver>,
    sweep_interval: Duration,
    max_checks: i32,
}

impl TrackingPollService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        integrations: Arc<dyn IntegrationStore>,
        audit: Arc<dyn AuditLogStore>,
        tracker: Arc<dyn Tracker>,
        sessions: SessionRegistry,
        observer: Arc<dyn DispatchObserver>,
        config: &AppConfig,
    ) -> Self {
        Self {
            orders,
            integrations,
            audit,
            tracker,
            sessions,
            observer,
            sweep_interval: Duration::from_secs(config.tracking_sweep_interval_secs),
            max_checks: config.max_checks_per_order,
        }
    }

    /// Starts the background poll loop.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.sweep_interval);

            loop {
                sweep_interval.tick().await;
                self.sweep(poll::to_local(Utc::now())).await;
            }
        })
    }

    /// One pass over every connected tenant. Quiet hours suppress the whole
    /// sweep; individual order failures are isolated.
    pub async fn sweep(&self, now: DateTime<Tz>) {
        if !poll::within_active_hours(now) {
            tracing::debug!("Skipping tracking sweep during quiet hours");
            return;
        }

        let tenants = self.sessions.connected().await;
        tracing::info!(tenants = tenants.len(), "Starting tracking sweep");

        for tenant_id in tenants {
            if let Err(e) = self.sweep_tenant(tenant_id, now).await {
                tracing::error!(%tenant_id, error = %e, "Tracking sweep failed for tenant");
            }
        }

        tracing::info!("Tracking sweep completed");
    }

    #[tracing::instrument(skip(self, now))]
    async fn sweep_tenant(&self, tenant_id: Uuid, now: DateTime<Tz>) -> Result<(), AppError> {
        let orders = self.orders.list_by_tenant(tenant_id).await?;

        for order in &orders {
            let Some(code) = order.tracking_code.as_deref() else {
                continue;
            };
            if order
                .internal_status
                .as_deref()
                .is_some_and(status::is_terminal)
            {
                continue;
            }
            if !poll::is_due(order, now, self.max_checks) {
                continue;
            }

            if let Err(e) = self.check_order(tenant_id, order, code).await {
                tracing::error!(order_id = %order.id, error = %e, "Tracking check failed for order");
                let _ = self
                    .audit
                    .append(
                        tenant_id,
                        "falha_rastreamento",
                        serde_json::json!({ "pedidoId": order.id, "erro": e.to_string() }),
                    )
                    .await;
            }
        }

        Ok(())
    }

    /// One API call for one order. Check bookkeeping is recorded whatever the
    /// outcome; status fields change only when the status actually moved.
    async fn check_order(&self, tenant_id: Uuid, order: &Order, code: &str) -> Result<(), AppError> {
        let api_key = self
            .integrations
            .tracking_api_key(tenant_id)
            .await?
            .unwrap_or_default();

        let update = self.tracker.track(&api_key, code).await;
        let checked_at = Utc::now();

        self.orders
            .record_check(tenant_id, order.id, checked_at)
            .await?;

        let new_status = update.status.to_lowercase();
        if !new_status.is_empty() && Some(new_status.as_str()) != order.internal_status.as_deref() {
            let normalized = TrackingUpdate {
                status: new_status.clone(),
                ..update
            };
            self.orders
                .apply_tracking_update(tenant_id, order.id, &normalized, checked_at)
                .await?;
            self.observer.order_updated(tenant_id, order.id).await;
        }

        self.audit
            .append(
                tenant_id,
                "rastreamento",
                serde_json::json!({ "pedidoId": order.id, "status": new_status }),
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        test_order, MockAuditLogStore, MockGateway, MockIntegrationStore, MockOrderStore,
        MockTracker,
    };
    use chrono::TimeZone;
    use chrono_tz::America::Sao_Paulo;
    use zapship_core::NoOpDispatchObserver;

    fn service(
        orders: Arc<MockOrderStore>,
        tracker: Arc<MockTracker>,
        audit: Arc<MockAuditLogStore>,
        sessions: SessionRegistry,
    ) -> TrackingPollService {
        let config = AppConfig {
            database_url: String::new(),
            db_max_connections: 1,
            tracking_api_url: String::new(),
            tracking_sweep_interval_secs: 300,
            automation_sweep_interval_secs: 60,
            step_delay_ms: 0,
            max_checks_per_order: 100,
        };
        TrackingPollService::new(
            orders,
            Arc::new(MockIntegrationStore::with_key("KEY")),
            audit,
            tracker,
            sessions,
            Arc::new(NoOpDispatchObserver),
            &config,
        )
    }

    fn in_window() -> DateTime<Tz> {
        Sao_Paulo.with_ymd_and_hms(2024, 5, 15, 10, 31, 0).unwrap()
    }

    async fn connected_session(tenant_id: Uuid) -> SessionRegistry {
        let sessions = SessionRegistry::new();
        sessions
            .register(tenant_id, Arc::new(MockGateway::new()))
            .await;
        sessions
    }

    #[tokio::test]
    async fn test_status_change_is_applied_and_audited() {
        let mut order = test_order();
        order.tracking_code = Some("AB123456789BR".to_string());
        order.internal_status = Some("postado".to_string());
        // Fresh "postado" with no check yet polls immediately.
        order.status_changed_at = Some(Utc::now());
        let tenant_id = order.tenant_id;

        let orders = Arc::new(MockOrderStore::new());
        orders.add(order.clone());

        let tracker = Arc::new(MockTracker::returning(TrackingUpdate {
            status: "Pedido a caminho".to_string(),
            location: Some("Curitiba".to_string()),
            last_update: Some("2024-05-15 09:12".to_string()),
            origin_location: Some("Curitiba".to_string()),
            destination_location: Some("São Paulo".to_string()),
            last_event_description: Some("Objeto em trânsito".to_string()),
        }));
        let audit = Arc::new(MockAuditLogStore::new());

        let service = service(
            orders.clone(),
            tracker,
            audit.clone(),
            connected_session(tenant_id).await,
        );
        service.sweep(in_window()).await;

        let stored = orders.get(order.id).unwrap();
        // Stored lowercased, with the check bookkeeping bumped.
        assert_eq!(stored.internal_status.as_deref(), Some("pedido a caminho"));
        assert_eq!(stored.check_count, 1);
        assert!(stored.last_checked_at.is_some());
        assert!(stored.status_changed_at.is_some());
        assert_eq!(audit.entries().len(), 1);
        assert_eq!(audit.entries()[0].1, "rastreamento");
    }

    #[tokio::test]
    async fn test_unchanged_status_only_records_check() {
        let mut order = test_order();
        order.tracking_code = Some("AB123456789BR".to_string());
        order.internal_status = Some("pedido a caminho".to_string());
        let tenant_id = order.tenant_id;

        let orders = Arc::new(MockOrderStore::new());
        orders.add(order.clone());

        let tracker = Arc::new(MockTracker::returning(TrackingUpdate {
            status: "Pedido a caminho".to_string(),
            location: None,
            last_update: None,
            origin_location: None,
            destination_location: None,
            last_event_description: None,
        }));
        let audit = Arc::new(MockAuditLogStore::new());

        let service = service(
            orders.clone(),
            tracker,
            audit.clone(),
            connected_session(tenant_id).await,
        );
        service.sweep(in_window()).await;

        let stored = orders.get(order.id).unwrap();
        assert_eq!(stored.check_count, 1);
        assert!(stored.status_changed_at.is_none());
    }

    #[tokio::test]
    async fn test_api_failure_records_sentinel_status() {
        let mut order = test_order();
        order.tracking_code = Some("AB123456789BR".to_string());
        let tenant_id = order.tenant_id;

        let orders = Arc::new(MockOrderStore::new());
        orders.add(order.clone());

        let tracker = Arc::new(MockTracker::returning(TrackingUpdate::api_error()));
        let audit = Arc::new(MockAuditLogStore::new());

        let service = service(
            orders.clone(),
            tracker,
            audit.clone(),
            connected_session(tenant_id).await,
        );
        service.sweep(in_window()).await;

        let stored = orders.get(order.id).unwrap();
        assert_eq!(stored.internal_status.as_deref(), Some("erro_api"));
        assert_eq!(stored.last_location.as_deref(), Some("-"));
        assert_eq!(stored.check_count, 1);
    }

    #[tokio::test]
    async fn test_quiet_hours_skip_the_sweep() {
        let mut order = test_order();
        order.tracking_code = Some("AB123456789BR".to_string());
        let tenant_id = order.tenant_id;

        let orders = Arc::new(MockOrderStore::new());
        orders.add(order.clone());

        let tracker = Arc::new(MockTracker::returning(TrackingUpdate::api_error()));

        let service = service(
            orders.clone(),
            tracker.clone(),
            Arc::new(MockAuditLogStore::new()),
            connected_session(tenant_id).await,
        );
        let night = Sao_Paulo.with_ymd_and_hms(2024, 5, 15, 23, 0, 0).unwrap();
        service.sweep(night).await;

        assert_eq!(tracker.call_count(), 0);
        assert_eq!(orders.get(order.id).unwrap().check_count, 0);
    }

    #[tokio::test]
    async fn test_configured_check_cap_throttles_polling() {
        let mut order = test_order();
        order.tracking_code = Some("AB123456789BR".to_string());
        order.internal_status = Some("em trânsito".to_string());
        order.check_count = 5;
        order.last_checked_at = Some(
            (in_window() - chrono::Duration::hours(2)).with_timezone(&Utc),
        );
        let tenant_id = order.tenant_id;

        let orders = Arc::new(MockOrderStore::new());
        orders.add(order.clone());

        let tracker = Arc::new(MockTracker::returning(TrackingUpdate::api_error()));

        let config = AppConfig {
            database_url: String::new(),
            db_max_connections: 1,
            tracking_api_url: String::new(),
            tracking_sweep_interval_secs: 300,
            automation_sweep_interval_secs: 60,
            step_delay_ms: 0,
            max_checks_per_order: 3,
        };
        let service = TrackingPollService::new(
            orders.clone(),
            Arc::new(MockIntegrationStore::with_key("KEY")),
            Arc::new(MockAuditLogStore::new()),
            tracker.clone(),
            connected_session(tenant_id).await,
            Arc::new(NoOpDispatchObserver),
            &config,
        );
        service.sweep(in_window()).await;

        // Five checks already exceed the lowered cap, so the two-hour-old
        // check keeps the order throttled despite the open window.
        assert_eq!(tracker.call_count(), 0);
        assert_eq!(orders.get(order.id).unwrap().check_count, 5);
    }

    #[tokio::test]
    async fn test_terminal_and_codeless_orders_are_skipped() {
        let tenant_id = Uuid::new_v4();

        let mut delivered = test_order();
        delivered.tenant_id = tenant_id;
        delivered.tracking_code = Some("AB123456789BR".to_string());
        delivered.internal_status = Some("entregue".to_string());

        let mut codeless = test_order();
        codeless.tenant_id = tenant_id;

        let orders = Arc::new(MockOrderStore::new());
        orders.add(delivered);
        orders.add(codeless);

        let tracker = Arc::new(MockTracker::returning(TrackingUpdate::api_error()));

        let service = service(
            orders,
            tracker.clone(),
            Arc::new(MockAuditLogStore::new()),
            connected_session(tenant_id).await,
        );
        service.sweep(in_window()).await;

        assert_eq!(tracker.call_count(), 0);
    }
}
