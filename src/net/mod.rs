//! Networking module
//!
//! This module handles all network-related functionality for the Muddy server:
//! - Length-framed TCP handling for native clients
//! - WebSocket handling for browser clients
//! - Session registry and per-connection stream processing
//! - Room event fan-out

pub mod broadcast;
pub mod handler;
pub mod processor;
pub mod session;
pub mod transport;

pub use broadcast::{Event, EventBroadcaster, EventKind, EVENT_PREFIX};
pub use handler::ConnectionHandler;
pub use processor::{ExitReason, StreamProcessor, HEARTBEAT, HEARTBEAT_ACK};
pub use session::{ConnectionId, PendingPlayer, PlayerId, Session, SessionHandle, SessionRegistry};
pub use transport::{FramedTransport, MessageStream, UnifiedTransport, WebSocketTransport};
