//! Status-driven automation dispatch.

pub mod dispatcher;

pub use dispatcher::{classify, AutomationDispatcher, Classification};
