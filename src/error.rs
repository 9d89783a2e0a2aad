//! Error handling module
//!
//! Defines the error types shared by the Muddy server.

use std::io;

use thiserror::Error;

use crate::game::RoomId;

/// Main error type for the Muddy server
#[derive(Error, Debug)]
pub enum MuddyError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Framing and wire-format errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// World loading and lookup errors
    #[error("World error: {0}")]
    World(#[from] WorldError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MuddyError {
    /// Whether the owning connection can keep reading after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MuddyError::Protocol(ProtocolError::MessageTooLarge { .. })
                | MuddyError::Protocol(ProtocolError::InvalidUtf8)
        )
    }
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Outbound queue full")]
    QueueFull,

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),
}

/// Framing and wire-format errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Frame exceeds maximum length of {max} bytes")]
    FrameTooLarge { max: usize },

    #[error("Invalid UTF-8 in message")]
    InvalidUtf8,
}

/// Session registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Max player limit reached, please try again")]
    CapacityExceeded,

    #[error("no pending session found")]
    NotFound,

    #[error("no free session slot available")]
    Exhausted,

    #[error("player is already registered")]
    AlreadyRegistered,

    #[error("connection {0} is already bound to a session")]
    AlreadyBound(u64),
}

/// World loading and lookup errors
#[derive(Error, Debug)]
pub enum WorldError {
    #[error("World has no rooms")]
    Empty,

    #[error("Duplicate room id: {0}")]
    DuplicateRoom(RoomId),

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Room {from} has an exit to unknown room {to}")]
    DanglingExit { from: RoomId, to: RoomId },

    #[error("Room {room} lists item '{name}' more than once")]
    DuplicateItem { room: RoomId, name: String },

    #[error("Item name '{0}' is too long")]
    ItemNameTooLong(String),
}

/// Command grammar errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    #[error("expected keyword '{0}'")]
    WrongKeyword(&'static str),

    #[error("'{0}' requires an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' takes no argument")]
    UnexpectedArgument(&'static str),

    #[error("argument too long: {actual} characters (max: {max})")]
    TooLong { max: usize, actual: usize },

    #[error("unknown direction: {0}")]
    InvalidDirection(String),

    #[error("no valid command found")]
    NoMatch,
}

/// Result type alias for Muddy operations
pub type Result<T> = std::result::Result<T, MuddyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed");

        let err = ProtocolError::MessageTooLarge { size: 300, max: 256 };
        assert_eq!(err.to_string(), "Message too large: 300 bytes (max: 256)");

        let err = RegistryError::CapacityExceeded;
        assert_eq!(
            err.to_string(),
            "Max player limit reached, please try again"
        );

        let err = WorldError::DanglingExit { from: 1, to: 9 };
        assert_eq!(err.to_string(), "Room 1 has an exit to unknown room 9");
    }

    #[test]
    fn test_registry_error_wraps() {
        let err: MuddyError = RegistryError::NotFound.into();
        assert_eq!(err.to_string(), "Registry error: no pending session found");
    }

    #[test]
    fn test_recoverable_errors() {
        let err: MuddyError = ProtocolError::InvalidUtf8.into();
        assert!(err.is_recoverable());

        let err: MuddyError = NetworkError::ReadError("reset".into()).into();
        assert!(!err.is_recoverable());
    }
}
