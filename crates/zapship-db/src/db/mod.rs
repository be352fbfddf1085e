//! Database repositories for the data access layer.
//!
//! Each repository owns one domain entity and implements the matching store
//! trait from [`store`]. Services depend on the traits, so tests can swap in
//! in-memory implementations.

pub mod audit;
pub mod automation;
pub mod flow;
pub mod history;
pub mod integration;
pub mod order;
pub mod store;

pub use audit::AuditLogRepository;
pub use automation::AutomationRepository;
pub use flow::FlowRepository;
pub use history::HistoryRepository;
pub use integration::IntegrationRepository;
pub use order::OrderRepository;
pub use store::{
    AuditLogStore, AutomationStore, FlowStore, HistoryStore, IntegrationStore, OrderStore,
};
