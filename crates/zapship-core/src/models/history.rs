use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::automation::StepKind;

/// Who produced a message in an order's conversation history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "message_origin", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    Customer,
    Bot,
}

impl Display for MessageOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MessageOrigin::Customer => write!(f, "customer"),
            MessageOrigin::Bot => write!(f, "bot"),
        }
    }
}

/// Stored conversation history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MessageHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    pub tenant_id: Uuid,
    pub body: String,
    /// Label of the entry: `recebida` for inbound, otherwise the trigger key
    /// or flow label that produced the send.
    pub kind: String,
    pub origin: MessageOrigin,
    pub media_url: Option<String>,
    pub media_kind: StepKind,
    pub sent_at: DateTime<Utc>,
}

/// History entry to append. The store also refreshes the order's
/// last-message columns as part of the append.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub order_id: Uuid,
    pub tenant_id: Uuid,
    pub body: String,
    pub kind: String,
    pub origin: MessageOrigin,
    pub media_url: Option<String>,
    pub media_kind: StepKind,
}

impl NewHistoryEntry {
    /// Plain inbound text from the contact.
    pub fn received(order_id: Uuid, tenant_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            order_id,
            tenant_id,
            body: body.into(),
            kind: "recebida".to_string(),
            origin: MessageOrigin::Customer,
            media_url: None,
            media_kind: StepKind::Text,
        }
    }

    /// Plain outbound text sent by an automation or flow.
    pub fn sent(
        order_id: Uuid,
        tenant_id: Uuid,
        kind: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            tenant_id,
            body: body.into(),
            kind: kind.into(),
            origin: MessageOrigin::Bot,
            media_url: None,
            media_kind: StepKind::Text,
        }
    }
}
