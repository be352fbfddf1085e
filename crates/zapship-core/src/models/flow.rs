use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of a conversation node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "node_kind", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Content is sent and the flow auto-advances to the single successor.
    Message,
    /// Content is sent together with the option labels; the flow waits for
    /// a reply matching one of them.
    Question,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NodeKind::Message => write!(f, "message"),
            NodeKind::Question => write!(f, "question"),
        }
    }
}

impl FromStr for NodeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(NodeKind::Message),
            "question" => Ok(NodeKind::Question),
            _ => Err(anyhow::anyhow!("Invalid node kind: {}", s)),
        }
    }
}

/// A conversation flow owned by a tenant, started by a trigger keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Flow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Inbound text must equal this exactly to start the flow.
    pub trigger_keyword: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// One unit of conversation content within a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FlowNode {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub kind: NodeKind,
    pub content: String,
    pub is_start: bool,
    /// Authoring order within the flow; the lowest-position node is the
    /// fallback start when no node carries the start flag.
    pub position: i32,
}

/// A choice attached to a question node. `next_node_id = None` ends the flow.
/// Message nodes carry at most one option, acting as their outgoing edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct NodeOption {
    pub id: Uuid,
    pub node_id: Uuid,
    pub label: String,
    pub next_node_id: Option<Uuid>,
    pub position: i32,
}

/// Mid-conversation position of one contact. Exists only while the contact
/// is inside a flow; deleted on terminal nodes or unrecoverable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserFlowState {
    pub order_id: Uuid,
    pub flow_id: Uuid,
    pub node_id: Uuid,
    pub updated_at: DateTime<Utc>,
}
