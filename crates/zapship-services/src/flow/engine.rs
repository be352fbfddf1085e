use std::sync::Arc;

use zapship_core::models::{FlowNode, NodeKind, Order};
use zapship_core::{template, AppError, MessageGateway};
use zapship_db::FlowStore;

/// State machine over authored conversation flows, one position per contact.
///
/// Transitions commit only after the corresponding send succeeds, so a
/// gateway failure leaves the conversation where it was and the next inbound
/// message retries cleanly.
pub struct FlowEngine {
    flows: Arc<dyn FlowStore>,
}

impl FlowEngine {
    pub fn new(flows: Arc<dyn FlowStore>) -> Self {
        Self { flows }
    }

    /// Processes one inbound text. Returns `true` when the message was
    /// consumed by a flow (a transition occurred), `false` when the caller
    /// should treat it as ordinary chat.
    #[tracing::instrument(skip(self, gateway, order), fields(order_id = %order.id, tenant_id = %order.tenant_id))]
    pub async fn handle_inbound_text(
        &self,
        gateway: &dyn MessageGateway,
        order: &Order,
        text: &str,
    ) -> Result<bool, AppError> {
        if let Some(state) = self.flows.state_for_order(order.id).await? {
            let Some(current) = self.flows.node(state.node_id).await? else {
                // Dangling reference. Clear the conversation and fall through.
                tracing::warn!(node_id = %state.node_id, "Flow state points at a missing node, clearing");
                self.flows.delete_state(order.id).await?;
                return Ok(false);
            };

            return match current.kind {
                NodeKind::Question => self.answer_question(gateway, order, &current, text).await,
                NodeKind::Message => self.advance_message(gateway, order, &current).await,
            };
        }

        let Some(flow) = self
            .flows
            .find_active_by_trigger(order.tenant_id, text)
            .await?
        else {
            return Ok(false);
        };

        let Some(start) = self.flows.start_node(flow.id).await? else {
            tracing::warn!(flow_id = %flow.id, "Flow has no start node");
            return Ok(false);
        };

        self.send_node(gateway, order, &start).await?;
        self.flows.create_state(order.id, flow.id, start.id).await?;

        Ok(true)
    }

    /// A reply while waiting at a question node. Labels match case-sensitively;
    /// anything else leaves the state untouched.
    async fn answer_question(
        &self,
        gateway: &dyn MessageGateway,
        order: &Order,
        current: &FlowNode,
        text: &str,
    ) -> Result<bool, AppError> {
        let options = self.flows.options(current.id).await?;
        let Some(option) = options.iter().find(|o| o.label == text) else {
            return Ok(false);
        };

        let Some(next_id) = option.next_node_id else {
            // Terminal choice: the flow is over.
            self.flows.delete_state(order.id).await?;
            return Ok(true);
        };

        let Some(next) = self.flows.node(next_id).await? else {
            tracing::warn!(node_id = %next_id, "Option points at a missing node, clearing flow state");
            self.flows.delete_state(order.id).await?;
            return Ok(true);
        };

        self.send_node(gateway, order, &next).await?;
        self.flows.update_state_node(order.id, next.id).await?;

        Ok(true)
    }

    /// Any reply while sitting at a message node advances along its single
    /// outgoing edge, or ends the flow when there is none.
    async fn advance_message(
        &self,
        gateway: &dyn MessageGateway,
        order: &Order,
        current: &FlowNode,
    ) -> Result<bool, AppError> {
        let options = self.flows.options(current.id).await?;
        let next_id = options.first().and_then(|o| o.next_node_id);

        let Some(next_id) = next_id else {
            self.flows.delete_state(order.id).await?;
            return Ok(true);
        };

        let Some(next) = self.flows.node(next_id).await? else {
            tracing::warn!(node_id = %next_id, "Edge points at a missing node, clearing flow state");
            self.flows.delete_state(order.id).await?;
            return Ok(true);
        };

        self.send_node(gateway, order, &next).await?;
        self.flows.update_state_node(order.id, next.id).await?;

        Ok(true)
    }

    /// Renders and sends one node. Question nodes append their option labels
    /// as a `- label` listing so the contact sees the valid replies.
    async fn send_node(
        &self,
        gateway: &dyn MessageGateway,
        order: &Order,
        node: &FlowNode,
    ) -> Result<(), AppError> {
        let mut body = template::render(Some(&node.content), order).unwrap_or_default();

        if node.kind == NodeKind::Question {
            let options = self.flows.options(node.id).await?;
            if !options.is_empty() {
                let listing = options
                    .iter()
                    .map(|o| format!("- {}", o.label))
                    .collect::<Vec<_>>()
                    .join("\n");
                body = if body.is_empty() {
                    listing
                } else {
                    format!("{body}\n{listing}")
                };
            }
        }

        gateway.send_text(&order.phone, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_order, MockFlowStore, MockGateway};
    use uuid::Uuid;
    use zapship_core::models::{Flow, NodeOption, UserFlowState};
    use chrono::Utc;

    fn flow(tenant_id: Uuid, keyword: &str) -> Flow {
        Flow {
            id: Uuid::new_v4(),
            tenant_id,
            name: "Atendimento".to_string(),
            trigger_keyword: keyword.to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    fn node(flow_id: Uuid, kind: NodeKind, content: &str, is_start: bool, position: i32) -> FlowNode {
        FlowNode {
            id: Uuid::new_v4(),
            flow_id,
            kind,
            content: content.to_string(),
            is_start,
            position,
        }
    }

    fn option(node_id: Uuid, label: &str, next: Option<Uuid>, position: i32) -> NodeOption {
        NodeOption {
            id: Uuid::new_v4(),
            node_id,
            label: label.to_string(),
            next_node_id: next,
            position,
        }
    }

    #[tokio::test]
    async fn test_keyword_starts_flow_and_lists_options() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        let start = node(f.id, NodeKind::Question, "Continuar? (Sim/Não)", true, 0);
        store.add_flow(f.clone());
        store.add_node(start.clone());
        store.add_option(option(start.id, "Sim", None, 0));
        store.add_option(option(start.id, "Não", None, 1));

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store.clone());

        let handled = engine
            .handle_inbound_text(&gateway, &order, "menu")
            .await
            .unwrap();
        assert!(handled);

        let sent = gateway.sent_texts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Continuar? (Sim/Não)\n- Sim\n- Não");

        let state = store.state(order.id).expect("state created");
        assert_eq!(state.node_id, start.id);
    }

    #[tokio::test]
    async fn test_unknown_keyword_is_not_handled() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();
        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store);

        let handled = engine
            .handle_inbound_text(&gateway, &order, "oi tudo bem")
            .await
            .unwrap();
        assert!(!handled);
        assert!(gateway.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_match_is_exact() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        store.add_flow(f.clone());
        store.add_node(node(f.id, NodeKind::Message, "Olá", true, 0));

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store);

        let handled = engine
            .handle_inbound_text(&gateway, &order, "Menu")
            .await
            .unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_matching_option_advances_and_sends_next() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        let question = node(f.id, NodeKind::Question, "Continuar? (Sim/Não)", true, 0);
        let next = node(f.id, NodeKind::Message, "Ótimo, seguimos!", false, 1);
        store.add_flow(f.clone());
        store.add_node(question.clone());
        store.add_node(next.clone());
        store.add_option(option(question.id, "Sim", Some(next.id), 0));
        store.add_option(option(question.id, "Não", None, 1));
        store.set_state(UserFlowState {
            order_id: order.id,
            flow_id: f.id,
            node_id: question.id,
            updated_at: Utc::now(),
        });

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store.clone());

        let handled = engine
            .handle_inbound_text(&gateway, &order, "Sim")
            .await
            .unwrap();
        assert!(handled);

        let sent = gateway.sent_texts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Ótimo, seguimos!");
        assert_eq!(store.state(order.id).unwrap().node_id, next.id);
    }

    #[tokio::test]
    async fn test_unrecognized_reply_leaves_state_untouched() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        let question = node(f.id, NodeKind::Question, "Continuar?", true, 0);
        store.add_flow(f.clone());
        store.add_node(question.clone());
        store.add_option(option(question.id, "Sim", None, 0));
        store.set_state(UserFlowState {
            order_id: order.id,
            flow_id: f.id,
            node_id: question.id,
            updated_at: Utc::now(),
        });

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store.clone());

        let handled = engine
            .handle_inbound_text(&gateway, &order, "Talvez")
            .await
            .unwrap();
        assert!(!handled);
        assert!(gateway.sent_texts().is_empty());
        assert_eq!(store.state(order.id).unwrap().node_id, question.id);

        // Case matters: "sim" is not "Sim".
        let handled = engine
            .handle_inbound_text(&gateway, &order, "sim")
            .await
            .unwrap();
        assert!(!handled);
    }

    #[tokio::test]
    async fn test_terminal_option_deletes_state() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        let question = node(f.id, NodeKind::Question, "Continuar?", true, 0);
        store.add_flow(f.clone());
        store.add_node(question.clone());
        store.add_option(option(question.id, "Não", None, 0));
        store.set_state(UserFlowState {
            order_id: order.id,
            flow_id: f.id,
            node_id: question.id,
            updated_at: Utc::now(),
        });

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store.clone());

        let handled = engine
            .handle_inbound_text(&gateway, &order, "Não")
            .await
            .unwrap();
        assert!(handled);
        assert!(gateway.sent_texts().is_empty());
        assert!(store.state(order.id).is_none());
    }

    #[tokio::test]
    async fn test_dangling_state_node_clears_and_falls_through() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        store.set_state(UserFlowState {
            order_id: order.id,
            flow_id: Uuid::new_v4(),
            node_id: Uuid::new_v4(),
            updated_at: Utc::now(),
        });

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store.clone());

        let handled = engine
            .handle_inbound_text(&gateway, &order, "qualquer coisa")
            .await
            .unwrap();
        assert!(!handled);
        assert!(store.state(order.id).is_none());
    }

    #[tokio::test]
    async fn test_message_node_advances_on_any_reply() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        let first = node(f.id, NodeKind::Message, "Bem-vindo!", true, 0);
        let second = node(f.id, NodeKind::Message, "Como posso ajudar?", false, 1);
        store.add_flow(f.clone());
        store.add_node(first.clone());
        store.add_node(second.clone());
        store.add_option(option(first.id, "", Some(second.id), 0));
        store.set_state(UserFlowState {
            order_id: order.id,
            flow_id: f.id,
            node_id: first.id,
            updated_at: Utc::now(),
        });

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store.clone());

        let handled = engine
            .handle_inbound_text(&gateway, &order, "ok")
            .await
            .unwrap();
        assert!(handled);
        assert_eq!(gateway.sent_texts()[0].1, "Como posso ajudar?");
        assert_eq!(store.state(order.id).unwrap().node_id, second.id);
    }

    #[tokio::test]
    async fn test_message_node_without_edge_ends_flow() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        let last = node(f.id, NodeKind::Message, "Até logo!", true, 0);
        store.add_flow(f.clone());
        store.add_node(last.clone());
        store.set_state(UserFlowState {
            order_id: order.id,
            flow_id: f.id,
            node_id: last.id,
            updated_at: Utc::now(),
        });

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store.clone());

        let handled = engine
            .handle_inbound_text(&gateway, &order, "tchau")
            .await
            .unwrap();
        assert!(handled);
        assert!(store.state(order.id).is_none());
    }

    #[tokio::test]
    async fn test_send_failure_does_not_commit_transition() {
        let store = Arc::new(MockFlowStore::new());
        let order = test_order();

        let f = flow(order.tenant_id, "menu");
        let question = node(f.id, NodeKind::Question, "Continuar?", true, 0);
        let next = node(f.id, NodeKind::Message, "Seguimos!", false, 1);
        store.add_flow(f.clone());
        store.add_node(question.clone());
        store.add_node(next.clone());
        store.add_option(option(question.id, "Sim", Some(next.id), 0));
        store.set_state(UserFlowState {
            order_id: order.id,
            flow_id: f.id,
            node_id: question.id,
            updated_at: Utc::now(),
        });

        let gateway = MockGateway::failing();
        let engine = FlowEngine::new(store.clone());

        let result = engine.handle_inbound_text(&gateway, &order, "Sim").await;
        assert!(result.is_err());
        assert_eq!(store.state(order.id).unwrap().node_id, question.id);
    }

    #[tokio::test]
    async fn test_node_content_is_rendered() {
        let store = Arc::new(MockFlowStore::new());
        let mut order = test_order();
        order.name = "João Teste".to_string();

        let f = flow(order.tenant_id, "menu");
        let start = node(f.id, NodeKind::Message, "Olá {{primeiro_nome}}!", true, 0);
        store.add_flow(f.clone());
        store.add_node(start);

        let gateway = MockGateway::new();
        let engine = FlowEngine::new(store);

        engine
            .handle_inbound_text(&gateway, &order, "menu")
            .await
            .unwrap();
        assert_eq!(gateway.sent_texts()[0].1, "Olá João!");
    }
}
