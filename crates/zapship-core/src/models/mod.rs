//! Domain models shared across the workspace.

pub mod automation;
pub mod flow;
pub mod history;
pub mod order;

pub use automation::{AutomationConfig, AutomationSettings, AutomationStep, StepKind};
pub use flow::{Flow, FlowNode, NodeKind, NodeOption, UserFlowState};
pub use history::{MessageHistoryEntry, MessageOrigin, NewHistoryEntry};
pub use order::{NewOrder, Order, TrackingUpdate};
