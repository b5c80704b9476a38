//! Service Module
//!
//! Business logic layer for the gateway.

pub mod agent;

// Re-export for convenience
pub use agent::{AgentService, HostError};
