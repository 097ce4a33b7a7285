//! Configuration system.
//!
//! Loads configuration from JSON strings/files (file IO left to the app).
//! Tuning values are carried here and handed to the integrator and session
//! constructors explicitly; nothing reads them from ambient state.

use serde::{Deserialize, Serialize};

use crate::physics::SimConfig;

/// Default reliable (TCP) port of the port pair.
pub const DEFAULT_TCP_PORT: u16 = 4455;
/// Default unreliable (UDP) port of the port pair.
pub const DEFAULT_UDP_PORT: u16 = 4456;
/// Session establishment deadline in milliseconds.
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Server IP address, e.g. `127.0.0.1`.
    pub server_host: String,
    /// Reliable channel port.
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    /// Unreliable channel port.
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Handshake deadline; exceeding it is fatal to the session.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Index into [`crate::resolution::RESOLUTION_LIST`] for this endpoint.
    #[serde(default = "default_resolution_index")]
    pub resolution_index: i32,
    /// Physics tuning.
    #[serde(default)]
    pub sim: SimConfig,
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

fn default_connect_timeout_ms() -> u64 {
    CONNECT_TIMEOUT_MS
}

fn default_resolution_index() -> i32 {
    // 1920x1080, the scale-1.0 entry.
    2
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            tcp_port: default_tcp_port(),
            udp_port: default_udp_port(),
            tick_hz: 60,
            connect_timeout_ms: default_connect_timeout_ms(),
            resolution_index: default_resolution_index(),
            sim: SimConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
