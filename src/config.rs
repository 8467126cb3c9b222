//! Relay configuration from command-line flags and environment variables

use std::time::Duration;

use clap::Parser;

pub const DEFAULT_SIGNALING_PORT: u16 = 5000;

#[derive(Debug, Clone, Parser)]
#[command(name = "duet", version, about = "Room-scoped WebRTC signaling relay")]
pub struct RelayConfig {
    /// Interface to listen on
    #[arg(long, env = "DUET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "DUET_PORT", default_value_t = DEFAULT_SIGNALING_PORT)]
    pub port: u16,

    /// Origin allowed to open a connection (repeatable). Empty allows any origin.
    #[arg(long = "allowed-origin", env = "DUET_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "DUET_PING_INTERVAL_SECS", default_value_t = 30)]
    pub ping_interval_secs: u64,

    #[arg(long, env = "DUET_PONG_TIMEOUT_SECS", default_value_t = 10)]
    pub pong_timeout_secs: u64,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, env = "DUET_LOG", default_value = "info")]
    pub log_level: String,
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            origins: OriginPolicy::new(self.allowed_origins.iter().cloned()),
            ping_interval: Duration::from_secs(self.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs.max(1)),
        }
    }
}

/// Per-connection settings shared by every connection task
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub origins: OriginPolicy,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            origins: OriginPolicy::allow_any(),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

/// Allow-list for the `Origin` header of incoming handshakes.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn allow_any() -> Self {
        Self::default()
    }

    pub fn new(origins: impl IntoIterator<Item = String>) -> Self {
        let allowed = origins
            .into_iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        Self { allowed }
    }

    /// Requests without an `Origin` header are not from a browser and are let through.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match origin {
            _ if self.allowed.is_empty() => true,
            None => true,
            Some(origin) => self.allowed.iter().any(|a| a == origin),
        }
    }
}
