// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Server-level configuration: the URL surface and heartbeat tunables on
//! top of [`mimic_engine::EngineConfig`]'s per-document settings.

use std::time::Duration;

use mimic_engine::EngineConfig;

/// Everything `mimicd` needs beyond what [`EngineConfig`] already covers.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// URL prefix for the WebSocket route (default `/mimic`).
    pub base_path: String,
    /// Idle-socket keepalive: how often the server sends a ping.
    pub heartbeat_interval: Duration,
    /// How long a socket may go without a pong before it is dropped.
    pub heartbeat_timeout: Duration,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_path: "/mimic".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            engine: EngineConfig::default(),
        }
    }
}
