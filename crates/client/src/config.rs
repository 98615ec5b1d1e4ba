//! Client configuration.

use std::time::Duration;

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of connection attempts before giving up
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((delay as u64).min(self.max_delay_ms as u64))
    }
}

/// Top-level configuration for the marketplace client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the REST API (e.g. `https://api.example.com/api`)
    pub api_url: String,
    /// URL for the realtime WebSocket endpoint (e.g. `wss://api.example.com/ws`)
    pub socket_url: String,
    /// Timeout for a single connection attempt
    pub connect_timeout: Duration,
    /// How long `test_connection` waits for the matching pong
    pub ping_timeout: Duration,
    /// Quiescence interval between disconnect and connect during a manual reconnect
    pub reconnect_quiescence: Duration,
    /// Auto-reconnect policy
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, socket_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            socket_url: socket_url.into(),
            connect_timeout: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(5),
            reconnect_quiescence: Duration::from_secs(1),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn with_reconnect_quiescence(mut self, quiescence: Duration) -> Self {
        self.reconnect_quiescence = quiescence;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}
