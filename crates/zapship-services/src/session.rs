//! Registry of active per-tenant messaging sessions.
//!
//! The WhatsApp connection lifecycle (pairing, reconnects) happens outside
//! this workspace; whoever owns it registers a gateway here when a tenant
//! connects. The sweeps only ever look at sessions in the `Connected` state.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use zapship_core::MessageGateway;

/// Connection state of one tenant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// One tenant's session: its state plus the gateway to send through.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub status: SessionStatus,
    pub gateway: Arc<dyn MessageGateway>,
}

/// Thread-safe map of tenant id to session, shared by the sweeps and the
/// inbound handler. Reads are concurrent; registration is serialized.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a session as connected, replacing any previous handle.
    pub async fn register(&self, tenant_id: Uuid, gateway: Arc<dyn MessageGateway>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            tenant_id,
            SessionHandle {
                status: SessionStatus::Connected,
                gateway,
            },
        );
    }

    pub async fn set_status(&self, tenant_id: Uuid, status: SessionStatus) {
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get_mut(&tenant_id) {
            handle.status = status;
        }
    }

    pub async fn remove(&self, tenant_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&tenant_id);
    }

    /// Gateway of a tenant, only while its session is connected.
    pub async fn gateway(&self, tenant_id: Uuid) -> Option<Arc<dyn MessageGateway>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&tenant_id)
            .filter(|handle| handle.status == SessionStatus::Connected)
            .map(|handle| handle.gateway.clone())
    }

    /// Tenants with a connected session, in no particular order.
    pub async fn connected(&self) -> Vec<Uuid> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(_, handle)| handle.status == SessionStatus::Connected)
            .map(|(tenant_id, _)| *tenant_id)
            .collect()
    }
}
