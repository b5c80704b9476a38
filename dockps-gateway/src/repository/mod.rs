//! Repository Module
//!
//! Data access layer for the gateway.

pub mod host;

// Re-export for convenience
pub use host::{HostRepository, HostRepositoryError, PgHostRepository};

#[cfg(test)]
pub use host::InMemoryHostRepository;
