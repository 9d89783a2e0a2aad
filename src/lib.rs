//! Muddy Server Library
//!
//! This library provides the core of a small multi-user dungeon server:
//! player sessions, per-connection stream processing, the command
//! interpreter, room event fan-out and the world model.
//!
//! ## Modules
//!
//! - `api` - Login and health HTTP endpoints
//! - `command` - Player command grammar
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `game` - World model and command execution
//! - `net` - Transports, session registry, stream processing and broadcast

pub mod api;
pub mod command;
pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{MuddyError, Result};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
