//! Application state module
//!
//! Contains the shared state used across all server connections.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::{CommandInterpreter, World};
use crate::net::session::SessionRegistry;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Loaded world graph
    pub world: Arc<World>,
    /// Pending and active player sessions
    pub registry: Arc<SessionRegistry>,
    /// Command execution against world and registry
    pub interpreter: Arc<CommandInterpreter>,
    /// Time the server started
    pub started_at: Instant,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create application state around an already loaded world
    pub fn new(config: ServerConfig, world: World, shutdown_tx: broadcast::Sender<()>) -> Self {
        let world = Arc::new(world);
        let registry = Arc::new(SessionRegistry::new(config.max_players));
        let interpreter = Arc::new(CommandInterpreter::new(
            Arc::clone(&world),
            Arc::clone(&registry),
        ));

        info!(
            capacity = config.max_players,
            rooms = world.room_count(),
            "Application state initialized"
        );

        Self {
            config,
            world,
            registry,
            interpreter,
            started_at: Instant::now(),
            shutdown_tx,
        }
    }

    /// Load the configured world file and build the application state
    pub async fn load(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Result<Self> {
        let world = World::load(&config.world_path).await?;
        Ok(Self::new(config, world, shutdown_tx))
    }

    /// Seconds since startup
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("server_name", &self.config.server_name)
            .field("world", &self.world)
            .field("registry", &self.registry)
            .finish()
    }
}
