//! In-memory mocks for service unit tests.
//!
//! Mock stores implement the `zapship-db` traits over plain hash maps, and
//! the mock gateway records every send, so services can be exercised without
//! a database or a live WhatsApp session.

pub mod mocks;

pub use mocks::{
    test_order, MockAuditLogStore, MockAutomationStore, MockFlowStore, MockGateway,
    MockHistoryStore, MockIntegrationStore, MockOrderStore, MockTracker,
};
