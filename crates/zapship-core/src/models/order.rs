use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracked shipment/contact, unique per (tenant, phone).
///
/// The tracking poll mutates the status/bookkeeping fields; the automation
/// dispatcher mutates only `last_dispatched_trigger` (the idempotency marker).
/// The flow engine never writes to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Canonical `55DDD9XXXXXXXX` form, see `phone::normalize_phone`.
    pub phone: String,
    pub email: Option<String>,
    pub product: Option<String>,
    pub tracking_code: Option<String>,
    pub notes: Option<String>,
    /// Last status reported by the tracking API, lowercased.
    pub internal_status: Option<String>,
    /// Trigger key of the last automation successfully dispatched.
    /// Guards against re-sending the same automation on every sweep.
    pub last_dispatched_trigger: Option<String>,
    pub last_location: Option<String>,
    /// Raw last-update string as reported by the tracking API.
    pub last_update: Option<String>,
    pub origin_location: Option<String>,
    pub destination_location: Option<String>,
    pub last_event_description: Option<String>,
    /// Raw posted-date string, when known.
    pub posted_at: Option<String>,
    pub profile_pic_url: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i32,
    pub check_count: i32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// First whitespace-delimited token of the contact name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }
}

/// Fields needed to register a new contact/order.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub name: String,
    /// Already normalized by the caller.
    pub phone: String,
    pub email: Option<String>,
    pub product: Option<String>,
    pub tracking_code: Option<String>,
    pub notes: Option<String>,
    pub profile_pic_url: Option<String>,
}

/// Snapshot of the latest tracking movement for an order.
///
/// Produced by the tracking client; a failed API call yields the `erro_api`
/// sentinel status instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub status: String,
    pub location: Option<String>,
    pub last_update: Option<String>,
    pub origin_location: Option<String>,
    pub destination_location: Option<String>,
    pub last_event_description: Option<String>,
}

impl TrackingUpdate {
    /// Sentinel update recorded when the tracking API call fails.
    pub fn api_error() -> Self {
        Self {
            status: crate::status::STATUS_API_ERROR.to_string(),
            location: Some("-".to_string()),
            last_update: Some("-".to_string()),
            origin_location: None,
            destination_location: None,
            last_event_description: None,
        }
    }
}

/// Blank order for unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_order() -> Order {
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
