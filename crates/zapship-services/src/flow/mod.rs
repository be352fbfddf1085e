//! Keyword-triggered conversation flows.

pub mod engine;

pub use engine::FlowEngine;
