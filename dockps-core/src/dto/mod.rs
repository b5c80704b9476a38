//! Data Transfer Objects
//!
//! Request and response bodies exchanged between the browser, the gateway
//! and the agent. Browser-facing bodies use camelCase field names.

pub mod container;
pub mod log;
