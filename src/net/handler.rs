//! Connection handler module
//!
//! Handles the lifecycle of client connections including:
//! - Initial connection setup (TCP or WebSocket)
//! - Handshake: the first message carries the pending id issued by login
//! - Binding the pending registration to this connection
//! - Running the stream processor
//! - Teardown: exactly one registry disconnect per bound connection

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::{MuddyError, NetworkError, RegistryError, Result};
use crate::net::processor::{ExitReason, StreamProcessor};
use crate::net::session::{ConnectionId, PlayerId};
use crate::net::transport::{MessageStream, UnifiedTransport};
use crate::AppState;

/// Connection handler for processing client connections
#[derive(Clone)]
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a length-framed TCP connection (native client)
    pub async fn handle_tcp(
        self,
        stream: TcpStream,
        addr: SocketAddr,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        debug!(address = %addr, "Handling TCP connection");
        stream.set_nodelay(true)?;

        let transport = UnifiedTransport::tcp(stream, self.state.config.effective_buffer_size());
        self.serve(transport, addr, shutdown_rx).await
    }

    /// Handle a WebSocket connection (browser client)
    pub async fn handle_websocket(
        self,
        stream: TcpStream,
        addr: SocketAddr,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        debug!(address = %addr, "Handling WebSocket connection");
        stream.set_nodelay(true)?;

        let transport =
            UnifiedTransport::websocket(stream, self.state.config.effective_buffer_size()).await?;
        info!(address = %addr, "WebSocket connection established");
        self.serve(transport, addr, shutdown_rx).await
    }

    /// Run a connection from handshake to teardown over any message stream.
    ///
    /// `shutdown_rx` must be subscribed before the connection task is spawned,
    /// otherwise a shutdown sent in between is never seen.
    pub async fn serve<T: MessageStream>(
        &self,
        mut transport: T,
        addr: SocketAddr,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let connection_id = self.state.registry.next_connection_id();

        let pending_id = match self.read_pending_id(&mut transport, &mut shutdown_rx).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(connection_id, address = %addr, "Connection left before binding");
                close_quietly(&mut transport, connection_id).await;
                return Ok(());
            }
            Err(e) => {
                debug!(connection_id, address = %addr, error = %e, "Handshake failed");
                close_quietly(&mut transport, connection_id).await;
                return Err(e);
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(self.state.config.outbound_queue_size);
        let bound = pending_id
            .ok_or(RegistryError::NotFound)
            .and_then(|id| self.state.registry.connect(id, connection_id, outbound_tx));
        let session = match bound {
            Ok(session) => session,
            Err(e) => {
                warn!(connection_id, address = %addr, error = %e, "Unable to create player session");
                let notice = format!("Error creating player session: {}. Disconnecting...", e);
                if let Err(write_err) = transport.write_message(&notice).await {
                    trace!(connection_id, error = %write_err, "Failed to send rejection");
                }
                close_quietly(&mut transport, connection_id).await;
                return Err(e.into());
            }
        };

        info!(
            connection_id,
            address = %addr,
            player = %session.display_name,
            "Player entered the world"
        );

        let interpreter = &self.state.interpreter;
        let reason = match transport.write_message(&interpreter.welcome(&session)).await {
            Ok(()) => {
                interpreter.announce_arrival(&session);
                let reason = StreamProcessor::new(
                    interpreter,
                    &session,
                    &mut transport,
                    outbound_rx,
                    shutdown_rx,
                )
                .run()
                .await;
                interpreter.announce_departure(&session);
                reason
            }
            Err(e) => {
                warn!(connection_id, error = %e, "Failed to send greeting");
                ExitReason::TransportError
            }
        };

        let removed = self.state.registry.disconnect(connection_id);
        debug_assert!(removed, "bound connection was not in the registry");

        info!(
            connection_id,
            player = %session.display_name,
            reason = ?reason,
            connected_secs = session.connected_at.elapsed().as_secs(),
            "Player left the world"
        );

        close_quietly(&mut transport, connection_id).await;
        Ok(())
    }

    /// Wait for the first message, which names the pending registration.
    ///
    /// `Ok(None)` means the peer went away or the server is shutting down.
    /// `Ok(Some(None))` means the message was not a pending id at all.
    async fn read_pending_id<T: MessageStream>(
        &self,
        transport: &mut T,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<Option<Option<PlayerId>>> {
        let timeout = self.state.config.handshake_timeout();

        let message = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(None),
            result = tokio::time::timeout(timeout, transport.read_message()) => {
                result.map_err(|_| MuddyError::Network(NetworkError::Timeout))??
            }
        };

        Ok(message.map(|token| Uuid::parse_str(token.trim()).ok()))
    }
}

async fn close_quietly<T: MessageStream>(transport: &mut T, connection_id: ConnectionId) {
    if let Err(e) = transport.close().await {
        trace!(connection_id, error = %e, "Error during transport shutdown");
    }
}
