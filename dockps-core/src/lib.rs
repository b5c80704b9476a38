//! docker.ps Core
//!
//! Protocol plumbing and shared types for the docker.ps agent and gateway.
//!
//! This crate contains:
//! - Frame decoding: Docker's multiplexed log stream format
//! - SSE framing: event encoding and event-boundary splitting
//! - Relay: keep-alive and cancellation-aware re-streaming, used by both hops
//! - Domain types and DTOs exchanged between browser, gateway and agent

pub mod domain;
pub mod dto;
pub mod frame;
pub mod relay;
pub mod sse;

/// Header carrying the agent's shared authentication key
pub const AUTH_KEY_HEADER: &str = "x-auth-key";
