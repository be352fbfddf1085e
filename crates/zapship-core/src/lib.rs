//! Core domain types and pure logic for Zapship.
//!
//! This crate holds everything the rest of the workspace agrees on: the data
//! model, the unified error type, configuration, the template renderer, the
//! normalization rules for phones and statuses, the tracking poll-due policy,
//! and the collaborator traits (message gateway, dispatch observer).
//!
//! Database access lives in `zapship-db`; the services that drive conversations
//! and automations live in `zapship-services`.

pub mod config;
pub mod defaults;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod models;
pub mod phone;
pub mod poll;
pub mod status;
pub mod template;

pub use config::AppConfig;
pub use error::AppError;
pub use gateway::MessageGateway;
pub use hooks::{DispatchObserver, NoOpDispatchObserver};
