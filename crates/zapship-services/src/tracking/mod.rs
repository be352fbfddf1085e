//! Shipment tracking: API client and the poll sweep.

pub mod client;
pub mod service;

pub use client::{Tracker, TrackingClient};
pub use service::TrackingPollService;
