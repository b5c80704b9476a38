//! Agent configuration
//!
//! Every setting can come from a flag or an environment variable; flags win.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dockps_core::relay::RelayConfig;

use crate::docker::DaemonEndpoint;

/// Agent configuration
#[derive(Parser, Clone)]
#[command(name = "dockps-agent")]
#[command(about = "docker.ps host agent", long_about = None)]
pub struct Config {
    /// Address the agent API listens on
    #[arg(long, env = "AGENT_BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: SocketAddr,

    /// Docker daemon endpoint (unix:///path or tcp://host:port)
    #[arg(long, env = "DOCKER_HOST", default_value = "unix:///var/run/docker.sock")]
    pub docker_host: String,

    /// Pin the daemon API version (e.g. "v1.43"); unversioned paths when unset
    #[arg(long, env = "DOCKER_API_VERSION")]
    pub docker_api_version: Option<String>,

    /// Shared key the gateway must present in `x-auth-key`
    #[arg(long, env = "AGENT_AUTH_KEY", hide_env_values = true)]
    pub auth_key: Option<String>,

    /// File holding the shared key, used when no key is given directly
    #[arg(long, env = "AGENT_AUTH_KEY_FILE")]
    pub auth_key_file: Option<PathBuf>,

    /// Lines returned when a batch request does not specify `tail`
    #[arg(long, env = "DEFAULT_TAIL", default_value_t = 1000)]
    pub default_tail: u32,

    /// Idle time before the first keep-alive ping
    #[arg(long, env = "KEEPALIVE_IDLE_SECS", default_value_t = 15)]
    pub keepalive_idle_secs: u64,

    /// Interval between keep-alive pings once idle
    #[arg(long, env = "KEEPALIVE_INTERVAL_SECS", default_value_t = 5)]
    pub keepalive_interval_secs: u64,

    /// Time allowed between opening a stream and the client reading it
    #[arg(long, env = "ATTACH_TIMEOUT_SECS", default_value_t = 30)]
    pub attach_timeout_secs: u64,

    /// Decoded lines buffered per follow session
    #[arg(long, env = "STREAM_CHANNEL_CAPACITY", default_value_t = 256)]
    pub stream_channel_capacity: usize,
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        DaemonEndpoint::parse(&self.docker_host)?;

        if self.auth_key.is_none() && self.auth_key_file.is_none() {
            anyhow::bail!("either AGENT_AUTH_KEY or AGENT_AUTH_KEY_FILE must be set");
        }

        if self.auth_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            anyhow::bail!("auth_key cannot be empty");
        }

        if self.default_tail == 0 {
            anyhow::bail!("default_tail must be greater than 0");
        }

        if self.keepalive_idle_secs == 0 || self.keepalive_interval_secs == 0 {
            anyhow::bail!("keep-alive timings must be greater than 0");
        }

        if self.attach_timeout_secs == 0 {
            anyhow::bail!("attach_timeout_secs must be greater than 0");
        }

        if self.stream_channel_capacity == 0 {
            anyhow::bail!("stream_channel_capacity must be greater than 0");
        }

        Ok(())
    }

    /// The key to check requests against, read from the key file if needed
    pub fn resolve_auth_key(&self) -> anyhow::Result<String> {
        if let Some(key) = &self.auth_key {
            return Ok(key.trim().to_string());
        }

        let path = self
            .auth_key_file
            .as_ref()
            .context("no auth key configured")?;
        let key = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read auth key file {}", path.display()))?;
        let key = key.trim().to_string();

        if key.is_empty() {
            anyhow::bail!("auth key file {} is empty", path.display());
        }
        Ok(key)
    }

    pub fn endpoint(&self) -> anyhow::Result<DaemonEndpoint> {
        DaemonEndpoint::parse(&self.docker_host)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            keepalive_idle: Duration::from_secs(self.keepalive_idle_secs),
            keepalive_interval: Duration::from_secs(self.keepalive_interval_secs),
            attach_timeout: Duration::from_secs(self.attach_timeout_secs),
            channel_capacity: self.stream_channel_capacity,
        }
    }
}
