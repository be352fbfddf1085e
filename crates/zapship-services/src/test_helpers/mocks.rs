use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use zapship_core::models::{
    AutomationSettings, Flow, FlowNode, MessageHistoryEntry, NewHistoryEntry, NewOrder,
    NodeOption, Order, TrackingUpdate, UserFlowState,
};
use zapship_core::{defaults, AppError, MessageGateway};
use zapship_db::{
    AuditLogStore, AutomationStore, FlowStore, HistoryStore, IntegrationStore, OrderStore,
};

use crate::tracking::Tracker;

/// Blank order for service tests.
pub fn test_order() -> Order {
    Order {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        name: "João Teste".to_string(),
        phone: "5511987654321".to_string(),
        email: None,
        product: None,
        tracking_code: None,
        notes: None,
        internal_status: None,
        last_dispatched_trigger: None,
        last_location: None,
        last_update: None,
        origin_location: None,
        destination_location: None,
        last_event_description: None,
        posted_at: None,
        profile_pic_url: None,
        last_message: None,
        last_message_at: None,
        unread_count: 0,
        check_count: 0,
        last_checked_at: None,
        status_changed_at: None,
        created_at: Utc::now(),
    }
}

#[derive(Debug, Clone)]
struct GatewayCall {
    kind: String,
    phone: String,
    payload: String,
}

/// Gateway that records every send instead of talking to WhatsApp.
#[derive(Debug, Default)]
pub struct MockGateway {
    calls: Mutex<Vec<GatewayCall>>,
    fail_sends: bool,
    profile_pic: Option<String>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn with_profile_pic(url: &str) -> Self {
        Self {
            profile_pic: Some(url.to_string()),
            ..Self::default()
        }
    }

    fn record(&self, kind: &str, phone: &str, payload: &str) -> Result<(), AppError> {
        if self.fail_sends {
            return Err(AppError::Gateway("mock send failure".to_string()));
        }
        self.calls.lock().unwrap().push(GatewayCall {
            kind: kind.to_string(),
            phone: phone.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    /// `(phone, body)` of every text sent, in order.
    pub fn sent_texts(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind == "text")
            .map(|c| (c.phone.clone(), c.payload.clone()))
            .collect()
    }

    /// `(kind, payload)` of every call, in order. Media calls carry the URL.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| (c.kind.clone(), c.payload.clone()))
            .collect()
    }
}

#[async_trait]
impl MessageGateway for MockGateway {
    async fn send_text(&self, phone: &str, text: &str) -> Result<(), AppError> {
        self.record("text", phone, text)
    }

    async fn send_image(
        &self,
        phone: &str,
        media_url: &str,
        _caption: &str,
    ) -> Result<(), AppError> {
        self.record("image", phone, media_url)
    }

    async fn send_audio(&self, phone: &str, media_url: &str) -> Result<(), AppError> {
        self.record("audio", phone, media_url)
    }

    async fn send_video(
        &self,
        phone: &str,
        media_url: &str,
        _caption: &str,
    ) -> Result<(), AppError> {
        self.record("video", phone, media_url)
    }

    async fn send_file(
        &self,
        phone: &str,
        media_url: &str,
        _filename: &str,
        _caption: &str,
    ) -> Result<(), AppError> {
        self.record("file", phone, media_url)
    }

    async fn profile_pic_url(&self, _phone: &str) -> Option<String> {
        self.profile_pic.clone()
    }
}

/// Order store over a hash map.
#[derive(Default)]
pub struct MockOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl MockOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.orders.lock().unwrap().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }

    pub fn find_by_phone_sync(&self, tenant_id: Uuid, phone: &str) -> Option<Order> {
        self.orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.tenant_id == tenant_id && o.phone == phone)
            .cloned()
    }

    fn update<F: FnOnce(&mut Order)>(&self, id: Uuid, f: F) -> Result<(), AppError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Order {id}")))?;
        f(order);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MockOrderStore {
    async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn find_by_phone(
        &self,
        tenant_id: Uuid,
        phone: &str,
    ) -> Result<Option<Order>, AppError> {
        Ok(self.find_by_phone_sync(tenant_id, phone))
    }

    async fn create(&self, tenant_id: Uuid, new_order: NewOrder) -> Result<Order, AppError> {
        let mut order = test_order();
        order.tenant_id = tenant_id;
        order.name = new_order.name;
        order.phone = new_order.phone;
        order.email = new_order.email;
        order.product = new_order.product;
        order.tracking_code = new_order.tracking_code;
        order.notes = new_order.notes;
        order.profile_pic_url = new_order.profile_pic_url;
        self.add(order.clone());
        Ok(order)
    }

    async fn set_dispatch_marker(
        &self,
        _tenant_id: Uuid,
        order_id: Uuid,
        trigger: &str,
    ) -> Result<(), AppError> {
        self.update(order_id, |o| {
            o.last_dispatched_trigger = Some(trigger.to_string())
        })
    }

    async fn record_check(
        &self,
        _tenant_id: Uuid,
        order_id: Uuid,
        checked_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.update(order_id, |o| {
            o.last_checked_at = Some(checked_at);
            o.check_count += 1;
        })
    }

    async fn apply_tracking_update(
        &self,
        _tenant_id: Uuid,
        order_id: Uuid,
        update: &TrackingUpdate,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.update(order_id, |o| {
            o.internal_status = Some(update.status.clone());
            o.last_location = update.location.clone();
            o.last_update = update.last_update.clone();
            o.origin_location = update.origin_location.clone();
            o.destination_location = update.destination_location.clone();
            o.last_event_description = update.last_event_description.clone();
            o.status_changed_at = Some(changed_at);
        })
    }

    async fn increment_unread(&self, _tenant_id: Uuid, order_id: Uuid) -> Result<(), AppError> {
        self.update(order_id, |o| o.unread_count += 1)
    }

    async fn mark_read(&self, _tenant_id: Uuid, order_id: Uuid) -> Result<(), AppError> {
        self.update(order_id, |o| o.unread_count = 0)
    }
}

/// Flow store over hash maps.
#[derive(Default)]
pub struct MockFlowStore {
    flows: Mutex<Vec<Flow>>,
    nodes: Mutex<HashMap<Uuid, FlowNode>>,
    options: Mutex<Vec<NodeOption>>,
    states: Mutex<HashMap<Uuid, UserFlowState>>,
}

impl MockFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_flow(&self, flow: Flow) {
        self.flows.lock().unwrap().push(flow);
    }

    pub fn add_node(&self, node: FlowNode) {
        self.nodes.lock().unwrap().insert(node.id, node);
    }

    pub fn add_option(&self, option: NodeOption) {
        self.options.lock().unwrap().push(option);
    }

    pub fn set_state(&self, state: UserFlowState) {
        self.states.lock().unwrap().insert(state.order_id, state);
    }

    pub fn state(&self, order_id: Uuid) -> Option<UserFlowState> {
        self.states.lock().unwrap().get(&order_id).cloned()
    }
}

#[async_trait]
impl FlowStore for MockFlowStore {
    async fn find_active_by_trigger(
        &self,
        tenant_id: Uuid,
        keyword: &str,
    ) -> Result<Option<Flow>, AppError> {
        Ok(self
            .flows
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.tenant_id == tenant_id && f.active && f.trigger_keyword == keyword)
            .cloned())
    }

    async fn start_node(&self, flow_id: Uuid) -> Result<Option<FlowNode>, AppError> {
        let nodes = self.nodes.lock().unwrap();
        let mut candidates: Vec<&FlowNode> =
            nodes.values().filter(|n| n.flow_id == flow_id).collect();
        candidates.sort_by_key(|n| (!n.is_start, n.position));
        Ok(candidates.first().map(|n| (*n).clone()))
    }

    async fn node(&self, node_id: Uuid) -> Result<Option<FlowNode>, AppError> {
        Ok(self.nodes.lock().unwrap().get(&node_id).cloned())
    }

    async fn options(&self, node_id: Uuid) -> Result<Vec<NodeOption>, AppError> {
        let mut options: Vec<NodeOption> = self
            .options
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.node_id == node_id)
            .cloned()
            .collect();
        options.sort_by_key(|o| o.position);
        Ok(options)
    }

    async fn state_for_order(&self, order_id: Uuid) -> Result<Option<UserFlowState>, AppError> {
        Ok(self.state(order_id))
    }

    async fn create_state(
        &self,
        order_id: Uuid,
        flow_id: Uuid,
        node_id: Uuid,
    ) -> Result<(), AppError> {
        self.set_state(UserFlowState {
            order_id,
            flow_id,
            node_id,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn update_state_node(&self, order_id: Uuid, node_id: Uuid) -> Result<(), AppError> {
        let mut states = self.states.lock().unwrap();
        let state = states
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("Flow state for order {order_id}")))?;
        state.node_id = node_id;
        state.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_state(&self, order_id: Uuid) -> Result<(), AppError> {
        self.states.lock().unwrap().remove(&order_id);
        Ok(())
    }
}

/// Automation store that overlays explicit entries on the defaults, like the
/// real repository does with tenant rows.
#[derive(Default)]
pub struct MockAutomationStore {
    settings: Mutex<HashMap<(Uuid, String), AutomationSettings>>,
}

impl MockAutomationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tenant_id: Uuid, trigger: &str, settings: AutomationSettings) {
        self.settings
            .lock()
            .unwrap()
            .insert((tenant_id, trigger.to_string()), settings);
    }
}

#[async_trait]
impl AutomationStore for MockAutomationStore {
    async fn settings_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<HashMap<String, AutomationSettings>, AppError> {
        let mut merged = defaults::default_settings();
        for ((tenant, trigger), settings) in self.settings.lock().unwrap().iter() {
            if *tenant == tenant_id {
                merged.insert(trigger.clone(), settings.clone());
            }
        }
        Ok(merged)
    }
}

/// History store that keeps appended entries in memory.
#[derive(Default)]
pub struct MockHistoryStore {
    entries: Mutex<Vec<MessageHistoryEntry>>,
}

impl MockHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<MessageHistoryEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn append(&self, entry: NewHistoryEntry) -> Result<(), AppError> {
        self.entries.lock().unwrap().push(MessageHistoryEntry {
            id: Uuid::new_v4(),
            order_id: entry.order_id,
            tenant_id: entry.tenant_id,
            body: entry.body,
            kind: entry.kind,
            origin: entry.origin,
            media_url: entry.media_url,
            media_kind: entry.media_kind,
            sent_at: Utc::now(),
        });
        Ok(())
    }
}

/// Audit store that keeps `(tenant, kind, details)` tuples in memory.
#[derive(Default)]
pub struct MockAuditLogStore {
    entries: Mutex<Vec<(Uuid, String, serde_json::Value)>>,
}

impl MockAuditLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Uuid, String, serde_json::Value)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLogStore for MockAuditLogStore {
    async fn append(
        &self,
        tenant_id: Uuid,
        kind: &str,
        details: serde_json::Value,
    ) -> Result<(), AppError> {
        self.entries
            .lock()
            .unwrap()
            .push((tenant_id, kind.to_string(), details));
        Ok(())
    }
}

/// Integration store with a fixed API key for every tenant.
#[derive(Default)]
pub struct MockIntegrationStore {
    api_key: Option<String>,
}

impl MockIntegrationStore {
    pub fn with_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
        }
    }

    pub fn without_key() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationStore for MockIntegrationStore {
    async fn tracking_api_key(&self, _tenant_id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self.api_key.clone())
    }
}

/// Tracker that always returns the same update and counts its calls.
pub struct MockTracker {
    update: TrackingUpdate,
    calls: Mutex<u32>,
}

impl MockTracker {
    pub fn returning(update: TrackingUpdate) -> Self {
        Self {
            update,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Tracker for MockTracker {
    async fn track(&self, _api_key: &str, _code: &str) -> TrackingUpdate {
        *self.calls.lock().unwrap() += 1;
        self.update.clone()
    }
}
