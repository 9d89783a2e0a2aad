//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Smallest inbound message buffer a stream may be configured with
pub const MIN_STREAM_BUFFER_SIZE: usize = 256;

/// Largest inbound message buffer a stream may be configured with
pub const MAX_STREAM_BUFFER_SIZE: usize = 1024;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name displayed to players
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address every listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Length-framed TCP game port
    #[serde(default = "default_game_port")]
    pub game_port: u16,

    /// WebSocket port for browser clients
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// HTTP login/health API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Maximum number of pending plus active players
    #[serde(default = "default_max_players")]
    pub max_players: usize,

    /// Inbound message buffer size in bytes, clamped on use
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,

    /// Pushed events a session may have queued before deliveries are dropped
    #[serde(default = "default_outbound_queue_size")]
    pub outbound_queue_size: usize,

    /// Seconds a new connection has to present its pending id
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Seconds an unclaimed login stays reserved (0 to disable expiry)
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: u64,

    /// Seconds between pending-expiry sweeps
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,

    /// Path to the world definition file
    #[serde(default = "default_world_path")]
    pub world_path: PathBuf,

    /// Optional HTML client served at /game-client
    #[serde(default)]
    pub static_client_path: Option<PathBuf>,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

// Default value functions
fn default_server_name() -> String {
    "Muddy".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_game_port() -> u16 {
    4000
}

fn default_websocket_port() -> u16 {
    4001
}

fn default_api_port() -> u16 {
    8080
}

fn default_max_players() -> usize {
    64
}

fn default_stream_buffer_size() -> usize {
    MIN_STREAM_BUFFER_SIZE
}

fn default_outbound_queue_size() -> usize {
    32
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_pending_ttl() -> u64 {
    300 // 5 minutes
}

fn default_reap_interval() -> u64 {
    30
}

fn default_world_path() -> PathBuf {
    PathBuf::from("data/world.json")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            game_port: default_game_port(),
            websocket_port: default_websocket_port(),
            api_port: default_api_port(),
            max_players: default_max_players(),
            stream_buffer_size: default_stream_buffer_size(),
            outbound_queue_size: default_outbound_queue_size(),
            handshake_timeout_secs: default_handshake_timeout(),
            pending_ttl_secs: default_pending_ttl(),
            reap_interval_secs: default_reap_interval(),
            world_path: default_world_path(),
            static_client_path: None,
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        let config_path = env::var("MUDDY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("MUDDY_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("MUDDY_BIND_ADDRESS") {
            self.bind_address = val;
        }
        override_parsed("MUDDY_GAME_PORT", &mut self.game_port);
        // PORT is what most hosting platforms inject
        override_parsed("PORT", &mut self.api_port);
        override_parsed("MUDDY_API_PORT", &mut self.api_port);
        override_parsed("MUDDY_WEBSOCKET_PORT", &mut self.websocket_port);
        override_parsed("MUDDY_MAX_PLAYERS", &mut self.max_players);
        override_parsed("MUDDY_STREAM_BUFFER_SIZE", &mut self.stream_buffer_size);
        override_parsed("MUDDY_OUTBOUND_QUEUE_SIZE", &mut self.outbound_queue_size);
        override_parsed(
            "MUDDY_HANDSHAKE_TIMEOUT_SECS",
            &mut self.handshake_timeout_secs,
        );
        override_parsed("MUDDY_PENDING_TTL_SECS", &mut self.pending_ttl_secs);
        override_parsed("MUDDY_REAP_INTERVAL_SECS", &mut self.reap_interval_secs);
        if let Ok(val) = env::var("MUDDY_WORLD_PATH") {
            self.world_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MUDDY_STATIC_CLIENT_PATH") {
            self.static_client_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("MUDDY_DEBUG") {
            self.debug = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.game_port == self.websocket_port {
            anyhow::bail!("Game port and WebSocket port must be different");
        }
        if self.api_port == self.game_port || self.api_port == self.websocket_port {
            anyhow::bail!("API port must be different from game and WebSocket ports");
        }

        if self.max_players == 0 || self.max_players > 10000 {
            anyhow::bail!("Max players must be between 1 and 10000");
        }

        if self.outbound_queue_size == 0 {
            anyhow::bail!("Outbound queue size must be at least 1");
        }

        if self.handshake_timeout_secs == 0 {
            anyhow::bail!("Handshake timeout must be at least 1 second");
        }

        if self.reap_interval_secs == 0 && self.pending_ttl_secs > 0 {
            anyhow::bail!("Reap interval must be positive while pending expiry is enabled");
        }

        Ok(())
    }

    /// Inbound buffer size after clamping to the supported range
    pub fn effective_buffer_size(&self) -> usize {
        self.stream_buffer_size
            .clamp(MIN_STREAM_BUFFER_SIZE, MAX_STREAM_BUFFER_SIZE)
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug,muddy_server=trace"
        } else {
            "info,muddy_server=debug"
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Pending expiry, or `None` when disabled
    pub fn pending_ttl(&self) -> Option<Duration> {
        (self.pending_ttl_secs > 0).then(|| Duration::from_secs(self.pending_ttl_secs))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn game_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.game_port)
    }

    pub fn websocket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.websocket_port)
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }
}

fn override_parsed<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(key, value = %val, "Ignoring unparseable override"),
        }
    }
}
