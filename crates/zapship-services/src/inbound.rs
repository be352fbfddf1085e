//! Intake of inbound WhatsApp messages.
//!
//! One call per delivered message: registers unknown contacts (with an
//! immediate welcome), keeps unread counters and history, then offers the
//! text to the flow engine. Unhandled text is ordinary chat for the admin UI.

use std::sync::Arc;
use uuid::Uuid;

use zapship_core::gateway::DEFAULT_AVATAR_URL;
use zapship_core::models::{NewHistoryEntry, NewOrder, Order, StepKind};
use zapship_core::{phone, AppError, DispatchObserver};
use zapship_db::{HistoryStore, OrderStore};

use crate::automation::AutomationDispatcher;
use crate::flow::FlowEngine;
use crate::session::SessionRegistry;

/// One inbound message as delivered by the session layer. Group and
/// broadcast traffic is filtered out before it gets here.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Raw sender id, e.g. `5511987654321@c.us`.
    pub from: String,
    /// Display name pushed by the sender, when available.
    pub sender_name: Option<String>,
    /// Text body, or the caption of a media message.
    pub body: String,
    pub media_url: Option<String>,
    pub media_kind: StepKind,
}

pub struct InboundService {
    orders: Arc<dyn OrderStore>,
    history: Arc<dyn HistoryStore>,
    sessions: SessionRegistry,
    flow_engine: Arc<FlowEngine>,
    dispatcher: Arc<AutomationDispatcher>,
    observer: Arc<dyn DispatchObserver>,
}

impl InboundService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        history: Arc<dyn HistoryStore>,
        sessions: SessionRegistry,
        flow_engine: Arc<FlowEngine>,
        dispatcher: Arc<AutomationDispatcher>,
        observer: Arc<dyn DispatchObserver>,
    ) -> Self {
        Self {
            orders,
            history,
            sessions,
            flow_engine,
            dispatcher,
            observer,
        }
    }

    #[tracing::instrument(skip(self, message), fields(from = %message.from))]
    pub async fn handle_message(
        &self,
        tenant_id: Uuid,
        message: InboundMessage,
    ) -> Result<(), AppError> {
        let raw_phone = message.from.split('@').next().unwrap_or(&message.from);
        let Some(normalized) = phone::normalize_phone(raw_phone) else {
            tracing::debug!("Ignoring message from unnormalizable sender");
            return Ok(());
        };

        let Some(gateway) = self.sessions.gateway(tenant_id).await else {
            tracing::warn!(%tenant_id, "Inbound message for tenant without a connected session");
            return Ok(());
        };

        let order = match self.orders.find_by_phone(tenant_id, &normalized).await? {
            Some(order) => {
                self.orders.increment_unread(tenant_id, order.id).await?;
                order
            }
            None => {
                let order = self
                    .register_contact(tenant_id, gateway.as_ref(), &message, normalized)
                    .await?;
                self.observer.new_contact(tenant_id, order.id).await;

                // Welcome failures must not lose the inbound message itself.
                if let Err(e) = self
                    .dispatcher
                    .send_welcome(tenant_id, gateway.as_ref(), &order)
                    .await
                {
                    tracing::error!(order_id = %order.id, error = %e, "Welcome dispatch failed");
                }
                order
            }
        };

        let mut entry = NewHistoryEntry::received(order.id, tenant_id, message.body.clone());
        entry.media_url = message.media_url.clone();
        entry.media_kind = message.media_kind;
        self.history.append(entry).await?;

        let text = message.body.trim();
        if !text.is_empty() {
            let handled = self
                .flow_engine
                .handle_inbound_text(gateway.as_ref(), &order, text)
                .await?;
            if handled {
                tracing::debug!(order_id = %order.id, "Message consumed by flow");
            }
        }

        Ok(())
    }

    async fn register_contact(
        &self,
        tenant_id: Uuid,
        gateway: &dyn zapship_core::MessageGateway,
        message: &InboundMessage,
        normalized: String,
    ) -> Result<Order, AppError> {
        let profile_pic_url = gateway
            .profile_pic_url(&normalized)
            .await
            .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string());

        let name = message
            .sender_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| normalized.clone());

        self.orders
            .create(
                tenant_id,
                NewOrder {
                    name,
                    phone: normalized,
                    profile_pic_url: Some(profile_pic_url),
                    ..NewOrder::default()
                },
            )
            .await
    }
}
