//! Hooks for live observers.
//!
//! The admin UI keeps a websocket open per tenant; the core notifies it of
//! new contacts, dispatched messages, and order updates through this trait
//! without depending on any transport.

use async_trait::async_trait;
use uuid::Uuid;

/// Receives notifications about order/message activity for a tenant.
///
/// Implementations must be cheap and infallible from the caller's point of
/// view; delivery failures are the observer's own concern.
#[async_trait]
pub trait DispatchObserver: Send + Sync {
    /// A new contact/order was registered from an inbound message.
    async fn new_contact(&self, tenant_id: Uuid, order_id: Uuid);

    /// An automated or flow message was sent for this order.
    async fn message_dispatched(&self, tenant_id: Uuid, order_id: Uuid);

    /// Tracking data changed for this order.
    async fn order_updated(&self, tenant_id: Uuid, order_id: Uuid);
}

/// No-op implementation for tests and headless deployments.
#[derive(Debug, Default)]
pub struct NoOpDispatchObserver;

#[async_trait]
impl DispatchObserver for NoOpDispatchObserver {
    async fn new_contact(&self, _tenant_id: Uuid, _order_id: Uuid) {}

    async fn message_dispatched(&self, _tenant_id: Uuid, _order_id: Uuid) {}

    async fn order_updated(&self, _tenant_id: Uuid, _order_id: Uuid) {}
}
