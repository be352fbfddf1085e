//! Services driving conversations, automations, and tracking polls.
//!
//! The flow engine reacts to inbound messages; the automation dispatcher and
//! the tracking poll service run as interval sweeps over all connected tenant
//! sessions. Everything talks to the database through the store traits in
//! `zapship-db` and to WhatsApp through the `MessageGateway` seam.

pub mod automation;
pub mod flow;
pub mod inbound;
pub mod session;
pub mod test_helpers;
pub mod tracking;

pub use automation::AutomationDispatcher;
pub use flow::FlowEngine;
pub use inbound::InboundService;
pub use session::{SessionHandle, SessionRegistry, SessionStatus};
pub use tracking::{Tracker, TrackingClient, TrackingPollService};
