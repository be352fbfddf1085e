use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

use zapship_core::models::{AutomationSettings, AutomationStep, NewHistoryEntry, Order, StepKind};
use zapship_core::status::{
    trigger_key, TRACKING_LIFECYCLE_KEYS, TRIGGER_TRACKING_SENT, TRIGGER_WELCOME,
};
use zapship_core::{defaults, template, AppConfig, AppError, DispatchObserver, MessageGateway};
use zapship_db::{AuditLogStore, AutomationStore, HistoryStore, OrderStore};

use crate::session::SessionRegistry;

/// What the sweep decided to send for one order.
///
/// `marker` is what gets persisted as the dispatch marker; `config_key` is
/// the settings-map key. They differ only for status-driven triggers, where
/// the marker keeps the lowercased status as-is while the lookup key has its
/// whitespace normalized to underscores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub marker: String,
    pub config_key: String,
}

impl Classification {
    fn fixed(key: &str) -> Self {
        Self {
            marker: key.to_string(),
            config_key: key.to_string(),
        }
    }
}

/// Decides which automation, if any, an order is due for.
///
/// Exactly one trigger can fire per order per sweep:
/// 1. no tracking code and no prior dispatch -> welcome;
/// 2. tracking code present and the marker is not yet a tracking-lifecycle
///    key -> announce the code;
/// 3. the internal status moved past the marker -> that status's automation.
pub fn classify(order: &Order) -> Option<Classification> {
    let marker = order.last_dispatched_trigger.as_deref();

    if order.tracking_code.is_none() && marker.is_none() {
        return Some(Classification::fixed(TRIGGER_WELCOME));
    }

    if order.tracking_code.is_some()
        && !marker.is_some_and(|m| TRACKING_LIFECYCLE_KEYS.contains(&m))
    {
        return Some(Classification::fixed(TRIGGER_TRACKING_SENT));
    }

    if let Some(status) = order.internal_status.as_deref() {
        let lowered = status.to_lowercase();
        if marker != Some(lowered.as_str()) {
            return Some(Classification {
                config_key: trigger_key(status),
                marker: lowered,
            });
        }
    }

    None
}

/// Periodic sweep that sends status automations for every connected tenant.
pub struct AutomationDispatcher {
    orders: Arc<dyn OrderStore>,
    automations: Arc<dyn AutomationStore>,
    history: Arc<dyn HistoryStore>,
    audit: Arc<dyn AuditLogStore>,
    sessions: SessionRegistry,
    observer: Arc<dyn DispatchObserver>,
    sweep_interval: Duration,
    step_delay: Duration,
}

impl AutomationDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        automations: Arc<dyn AutomationStore>,
        history: Arc<dyn HistoryStore>,
        audit: Arc<dyn AuditLogStore>,
        sessions: SessionRegistry,
        observer: Arc<dyn DispatchObserver>,
        config: &AppConfig,
    ) -> Self {
        Self {
            orders,
            automations,
            history,
            audit,
            sessions,
            observer,
            sweep_interval: Duration::from_secs(config.automation_sweep_interval_secs),
            step_delay: Duration::from_millis(config.step_delay_ms),
        }
    }

    /// Starts the background sweep loop.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.sweep_interval);

            loop {
                sweep_interval.tick().await;
                self.sweep().await;
            }
        })
    }

    /// One pass over every connected tenant. Tenant failures are isolated.
    pub async fn sweep(&self) {
        let tenants = self.sessions.connected().await;
        tracing::info!(tenants = tenants.len(), "Starting automation sweep");

        for tenant_id in tenants {
            let Some(gateway) = self.sessions.gateway(tenant_id).await else {
                continue;
            };

            if let Err(e) = self.sweep_tenant(tenant_id, gateway.as_ref()).await {
                tracing::error!(%tenant_id, error = %e, "Automation sweep failed for tenant");
            }
        }

        tracing::info!("Automation sweep completed");
    }

    #[tracing::instrument(skip(self, gateway))]
    async fn sweep_tenant(
        &self,
        tenant_id: Uuid,
        gateway: &dyn MessageGateway,
    ) -> Result<(), AppError> {
        let settings = self.automations.settings_for_tenant(tenant_id).await?;
        let orders = self.orders.list_by_tenant(tenant_id).await?;

        for order in &orders {
            if let Err(e) = self
                .dispatch_for_order(tenant_id, gateway, order, &settings)
                .await
            {
                tracing::error!(order_id = %order.id, error = %e, "Automation dispatch failed for order");
            }
        }

        Ok(())
    }

    /// At most one trigger per order per sweep. The marker write happens only
    /// after every send succeeded; a failure means the same trigger fires
    /// again next sweep (at-least-once delivery).
    async fn dispatch_for_order(
        &self,
        tenant_id: Uuid,
        gateway: &dyn MessageGateway,
        order: &Order,
        settings: &HashMap<String, AutomationSettings>,
    ) -> Result<(), AppError> {
        let Some(classification) = classify(order) else {
            return Ok(());
        };

        self.dispatch_trigger(tenant_id, gateway, order, settings, &classification)
            .await
    }

    /// Sends the welcome automation right away for a freshly registered
    /// contact, without waiting for the next sweep.
    pub async fn send_welcome(
        &self,
        tenant_id: Uuid,
        gateway: &dyn MessageGateway,
        order: &Order,
    ) -> Result<(), AppError> {
        let settings = self.automations.settings_for_tenant(tenant_id).await?;
        self.dispatch_trigger(
            tenant_id,
            gateway,
            order,
            &settings,
            &Classification::fixed(TRIGGER_WELCOME),
        )
        .await
    }

    async fn dispatch_trigger(
        &self,
        tenant_id: Uuid,
        gateway: &dyn MessageGateway,
        order: &Order,
        settings: &HashMap<String, AutomationSettings>,
        classification: &Classification,
    ) -> Result<(), AppError> {
        let Some(config) = settings.get(&classification.config_key) else {
            return Ok(());
        };
        if !config.active {
            return Ok(());
        }

        if !config.steps.is_empty() {
            self.send_steps(tenant_id, gateway, order, &config.steps)
                .await?;
        } else {
            let base = config
                .message
                .as_deref()
                .or_else(|| defaults::default_message(&classification.config_key));
            let Some(body) = template::render(base, order) else {
                // Active trigger with nothing to say: leave the order alone.
                return Ok(());
            };

            gateway.send_text(&order.phone, &body).await?;
            self.history
                .append(NewHistoryEntry::sent(
                    order.id,
                    tenant_id,
                    classification.marker.clone(),
                    body,
                ))
                .await?;
        }

        self.orders
            .set_dispatch_marker(tenant_id, order.id, &classification.marker)
            .await?;
        self.audit
            .append(
                tenant_id,
                "mensagem_automatica",
                serde_json::json!({ "pedidoId": order.id, "tipo": classification.marker }),
            )
            .await?;
        self.observer.message_dispatched(tenant_id, order.id).await;

        tracing::info!(order_id = %order.id, trigger = %classification.marker, "Automation dispatched");

        Ok(())
    }

    /// Runs the ordered steps of one automation, pausing between sends to
    /// respect gateway rate limits.
    async fn send_steps(
        &self,
        tenant_id: Uuid,
        gateway: &dyn MessageGateway,
        order: &Order,
        steps: &[AutomationStep],
    ) -> Result<(), AppError> {
        let mut ordered: Vec<&AutomationStep> = steps.iter().collect();
        ordered.sort_by_key(|s| s.position);

        for step in ordered {
            let rendered = template::render(step.content.as_deref(), order);
            let caption = rendered.as_deref().unwrap_or("");

            match step.kind {
                StepKind::Text => {
                    if let Some(body) = rendered.as_deref() {
                        gateway.send_text(&order.phone, body).await?;
                    }
                }
                StepKind::Image => {
                    let url = step_media_url(step)?;
                    gateway.send_image(&order.phone, url, caption).await?;
                }
                StepKind::Audio => {
                    let url = step_media_url(step)?;
                    gateway.send_audio(&order.phone, url).await?;
                }
                StepKind::Video => {
                    let url = step_media_url(step)?;
                    gateway.send_video(&order.phone, url, caption).await?;
                }
                StepKind::File => {
                    let url = step_media_url(step)?;
                    gateway
                        .send_file(&order.phone, url, file_basename(url), caption)
                        .await?;
                }
            }

            let mut entry = NewHistoryEntry::sent(
                order.id,
                tenant_id,
                "automacao",
                rendered.clone().unwrap_or_default(),
            );
            entry.media_url = step.media_url.clone();
            entry.media_kind = step.kind;
            self.history.append(entry).await?;

            tokio::time::sleep(self.step_delay).await;
        }

        Ok(())
    }
}

fn step_media_url(step: &AutomationStep) -> Result<&str, AppError> {
    step.media_url.as_deref().ok_or_else(|| {
        AppError::InvalidInput(format!("Step {} of kind {} has no media URL", step.id, step.kind))
    })
}

fn file_basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_order;

    fn order_with(
        tracking_code: Option<&str>,
        status: Option<&str>,
        marker: Option<&str>,
    ) -> Order {
        let mut order = test_order();
        order.tracking_code = tracking_code.map(str::to_string);
        order.internal_status = status.map(str::to_string);
        order.last_dispatched_trigger = marker.map(str::to_string);
        order
    }

    #[test]
    fn test_classify_welcome_for_untouched_order() {
        let order = order_with(None, None, None);
        assert_eq!(
            classify(&order),
            Some(Classification::fixed(TRIGGER_WELCOME))
        );
    }

    #[test]
    fn test_classify_nothing_without_code_after_welcome() {
        let order = order_with(None, None, Some("boas_vindas"));
        assert_eq!(classify(&order), None);
    }

    #[test]
    fn test_classify_tracking_sent_when_code_appears() {
        let order = order_with(Some("AB123456789BR"), None, Some("boas_vindas"));
        assert_eq!(
            classify(&order),
            Some(Classification::fixed(TRIGGER_TRACKING_SENT))
        );

        // Also for orders imported with a code and no marker at all.
        let order = order_with(Some("AB123456789BR"), None, None);
        assert_eq!(
            classify(&order),
            Some(Classification::fixed(TRIGGER_TRACKING_SENT))
        );
    }

    #[test]
    fn test_classify_status_change_fires_status_trigger() {
        let order = order_with(
            Some("AB123456789BR"),
            Some("Pedido a caminho"),
            Some("envio_rastreio"),
        );
        assert_eq!(
            classify(&order),
            Some(Classification {
                marker: "pedido a caminho".to_string(),
                config_key: "pedido_a_caminho".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_is_idempotent_once_marker_matches() {
        let order = order_with(
            Some("AB123456789BR"),
            Some("Pedido a caminho"),
            Some("pedido a caminho"),
        );
        assert_eq!(classify(&order), None);
    }

    #[test]
    fn test_classify_at_most_one_trigger() {
        // Welcome-eligible order that also has a status somehow: the chain
        // stops at the first matching rule.
        let order = order_with(None, Some("Postado"), None);
        assert_eq!(
            classify(&order),
            Some(Classification::fixed(TRIGGER_WELCOME))
        );
    }

    mod dispatch {
        use super::*;
        use crate::session::SessionRegistry;
        use crate::test_helpers::{
            MockAuditLogStore, MockAutomationStore, MockGateway, MockHistoryStore, MockOrderStore,
        };
        use zapship_core::NoOpDispatchObserver;

        fn dispatcher(
            orders: Arc<MockOrderStore>,
            automations: Arc<MockAutomationStore>,
            history: Arc<MockHistoryStore>,
            audit: Arc<MockAuditLogStore>,
            sessions: SessionRegistry,
        ) -> AutomationDispatcher {
            let config = AppConfig {
                database_url: String::new(),
                db_max_connections: 1,
                tracking_api_url: String::new(),
                tracking_sweep_interval_secs: 300,
                automation_sweep_interval_secs: 60,
                step_delay_ms: 0,
                max_checks_per_order: 100,
            };
            AutomationDispatcher::new(
                orders,
                automations,
                history,
                audit,
                sessions,
                Arc::new(NoOpDispatchObserver),
                &config,
            )
        }

        #[tokio::test]
        async fn test_sweep_sends_rendered_status_message_and_sets_marker() {
            let order = order_with(
                Some("AB123456789BR"),
                Some("Pedido a caminho"),
                Some("envio_rastreio"),
            );
            let mut order = order;
            order.name = "João Teste".to_string();
            let tenant_id = order.tenant_id;

            let orders = Arc::new(MockOrderStore::new());
            orders.add(order.clone());

            let automations = Arc::new(MockAutomationStore::new());
            automations.set(
                tenant_id,
                "pedido_a_caminho",
                AutomationSettings {
                    active: true,
                    message: Some("Olá {{primeiro_nome}}, seu status é {{status_atual}}".into()),
                    steps: Vec::new(),
                },
            );

            let history = Arc::new(MockHistoryStore::new());
            let audit = Arc::new(MockAuditLogStore::new());
            let sessions = SessionRegistry::new();
            let gateway = Arc::new(MockGateway::new());
            sessions.register(tenant_id, gateway.clone()).await;

            let dispatcher = dispatcher(
                orders.clone(),
                automations,
                history.clone(),
                audit.clone(),
                sessions,
            );
            dispatcher.sweep().await;

            let sent = gateway.sent_texts();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].1, "Olá João, seu status é Pedido a caminho");

            let stored = orders.get(order.id).unwrap();
            assert_eq!(
                stored.last_dispatched_trigger.as_deref(),
                Some("pedido a caminho")
            );
            assert_eq!(history.entries().len(), 1);
            assert_eq!(audit.entries().len(), 1);
            assert_eq!(audit.entries()[0].1, "mensagem_automatica");
        }

        #[tokio::test]
        async fn test_inactive_config_sends_nothing() {
            let order = order_with(None, None, None);
            let tenant_id = order.tenant_id;

            let orders = Arc::new(MockOrderStore::new());
            orders.add(order.clone());

            let automations = Arc::new(MockAutomationStore::new());
            automations.set(
                tenant_id,
                TRIGGER_WELCOME,
                AutomationSettings {
                    active: false,
                    message: Some("Olá!".into()),
                    steps: Vec::new(),
                },
            );

            let sessions = SessionRegistry::new();
            let gateway = Arc::new(MockGateway::new());
            sessions.register(tenant_id, gateway.clone()).await;

            let dispatcher = dispatcher(
                orders.clone(),
                automations,
                Arc::new(MockHistoryStore::new()),
                Arc::new(MockAuditLogStore::new()),
                sessions,
            );
            dispatcher.sweep().await;

            assert!(gateway.sent_texts().is_empty());
            assert!(orders.get(order.id).unwrap().last_dispatched_trigger.is_none());
        }

        #[tokio::test]
        async fn test_send_failure_leaves_marker_unset() {
            let order = order_with(None, None, None);
            let tenant_id = order.tenant_id;

            let orders = Arc::new(MockOrderStore::new());
            orders.add(order.clone());

            let sessions = SessionRegistry::new();
            let gateway = Arc::new(MockGateway::failing());
            sessions.register(tenant_id, gateway.clone()).await;

            let dispatcher = dispatcher(
                orders.clone(),
                Arc::new(MockAutomationStore::new()),
                Arc::new(MockHistoryStore::new()),
                Arc::new(MockAuditLogStore::new()),
                sessions,
            );
            // The welcome default is active, so a send is attempted and fails.
            dispatcher.sweep().await;

            assert!(orders.get(order.id).unwrap().last_dispatched_trigger.is_none());
        }

        #[tokio::test]
        async fn test_steps_run_in_order_through_matching_gateway_methods() {
            let mut order = order_with(Some("AB123456789BR"), None, None);
            order.name = "Maria Silva".to_string();
            let tenant_id = order.tenant_id;

            let orders = Arc::new(MockOrderStore::new());
            orders.add(order.clone());

            let step = |position: i32, kind: StepKind, content: Option<&str>, media: Option<&str>| {
                AutomationStep {
                    id: Uuid::new_v4(),
                    config_id: Uuid::new_v4(),
                    position,
                    kind,
                    content: content.map(str::to_string),
                    media_url: media.map(str::to_string),
                }
            };

            let automations = Arc::new(MockAutomationStore::new());
            automations.set(
                tenant_id,
                TRIGGER_TRACKING_SENT,
                AutomationSettings {
                    active: true,
                    message: None,
                    steps: vec![
                        step(1, StepKind::Image, Some("Seu pedido"), Some("https://cdn.example.com/foto.png")),
                        step(0, StepKind::Text, Some("Olá {{primeiro_nome}}"), None),
                    ],
                },
            );

            let history = Arc::new(MockHistoryStore::new());
            let sessions = SessionRegistry::new();
            let gateway = Arc::new(MockGateway::new());
            sessions.register(tenant_id, gateway.clone()).await;

            let dispatcher = dispatcher(
                orders.clone(),
                automations,
                history.clone(),
                Arc::new(MockAuditLogStore::new()),
                sessions,
            );
            dispatcher.sweep().await;

            // Position order, not authoring order.
            let log = gateway.calls();
            assert_eq!(log.len(), 2);
            assert_eq!(log[0], ("text".to_string(), "Olá Maria".to_string()));
            assert_eq!(
                log[1],
                ("image".to_string(), "https://cdn.example.com/foto.png".to_string())
            );
            assert_eq!(history.entries().len(), 2);
            assert_eq!(
                orders.get(order.id).unwrap().last_dispatched_trigger.as_deref(),
                Some(TRIGGER_TRACKING_SENT)
            );
        }

        #[tokio::test]
        async fn test_send_welcome_uses_default_message() {
            let mut order = order_with(None, None, None);
            order.name = "João Teste".to_string();
            let tenant_id = order.tenant_id;

            let orders = Arc::new(MockOrderStore::new());
            orders.add(order.clone());

            let gateway = MockGateway::new();
            let dispatcher = dispatcher(
                orders.clone(),
                Arc::new(MockAutomationStore::new()),
                Arc::new(MockHistoryStore::new()),
                Arc::new(MockAuditLogStore::new()),
                SessionRegistry::new(),
            );

            dispatcher
                .send_welcome(tenant_id, &gateway, &order)
                .await
                .unwrap();

            let sent = gateway.sent_texts();
            assert_eq!(sent.len(), 1);
            assert!(sent[0].1.contains("João"));
            assert_eq!(
                orders.get(order.id).unwrap().last_dispatched_trigger.as_deref(),
                Some(TRIGGER_WELCOME)
            );
        }
    }
}
