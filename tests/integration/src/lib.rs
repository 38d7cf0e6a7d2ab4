//! Integration test utilities for the switchboard gateway
//!
//! This crate provides helpers for running end-to-end tests against a real
//! gateway with fake backend services and WebSocket clients.

pub mod fixtures;

pub use fixtures::*;
pub use helpers::*;
