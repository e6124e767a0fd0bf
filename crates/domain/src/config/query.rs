use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 53;
pub const DEFAULT_TLS_PORT: u16 = 853;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Per-exchange timeout in milliseconds; `0` disables the deadline.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_port")]
    pub udp_port: u16,

    #[serde(default = "default_port")]
    pub tcp_port: u16,

    #[serde(default = "default_tls_port")]
    pub tls_port: u16,

    #[serde(default)]
    pub source: Option<IpAddr>,

    #[serde(default)]
    pub source_port: u16,

    #[serde(default)]
    pub ignore_unexpected: bool,

    #[serde(default)]
    pub ignore_trailing: bool,

    #[serde(default = "default_true")]
    pub fallback_to_tcp: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            udp_port: DEFAULT_PORT,
            tcp_port: DEFAULT_PORT,
            tls_port: DEFAULT_TLS_PORT,
            source: None,
            source_port: 0,
            ignore_unexpected: false,
            ignore_trailing: false,
            fallback_to_tcp: true,
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_tls_port() -> u16 {
    DEFAULT_TLS_PORT
}

fn default_true() -> bool {
    true
}
