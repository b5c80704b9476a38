//! Core domain types
//!
//! Structures shared between the gateway (which resolves hosts) and the
//! agent (which produces log lines).

pub mod host;
pub mod log;
