//! Stream processor module
//!
//! The per-connection read/dispatch/write loop. One processor owns one bound
//! session and its stream. It handles one inbound message at a time and writes
//! the response before reading again, so a player never has two commands in
//! flight. Events queued for the session by other players are written between
//! commands.

use std::fmt;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, trace, warn};

use crate::error::MuddyError;
use crate::game::{CommandInterpreter, Response};
use crate::net::session::Session;
use crate::net::transport::MessageStream;

/// Heartbeat token; answered without touching the interpreter
pub const HEARTBEAT: &str = "PING";

/// Heartbeat acknowledgment
pub const HEARTBEAT_ACK: &str = "PONG";

/// Where the processor is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Reading,
    Dispatching,
    Writing,
    Closing,
}

impl ProcessorState {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessorState::Reading => "Reading",
            ProcessorState::Dispatching => "Dispatching",
            ProcessorState::Writing => "Writing",
            ProcessorState::Closing => "Closing",
        }
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a processor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Peer closed the stream
    EndOfStream,
    /// Player asked to leave
    Quit,
    /// Server is shutting down
    Shutdown,
    /// Read or write failed
    TransportError,
}

/// Read/dispatch/write loop for one bound session
pub struct StreamProcessor<'a, T> {
    interpreter: &'a CommandInterpreter,
    session: &'a Session,
    transport: &'a mut T,
    outbound_rx: mpsc::Receiver<String>,
    shutdown_rx: broadcast::Receiver<()>,
    state: ProcessorState,
}

impl<'a, T: MessageStream> StreamProcessor<'a, T> {
    pub fn new(
        interpreter: &'a CommandInterpreter,
        session: &'a Session,
        transport: &'a mut T,
        outbound_rx: mpsc::Receiver<String>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            interpreter,
            session,
            transport,
            outbound_rx,
            shutdown_rx,
            state: ProcessorState::Reading,
        }
    }

    fn transition(&mut self, next: ProcessorState) {
        if self.state != next {
            trace!(
                connection_id = self.session.connection_id,
                from = %self.state,
                to = %next,
                "Processor state change"
            );
            self.state = next;
        }
    }

    /// Run until the stream ends, the player quits, a transport error occurs,
    /// or shutdown is signalled. The caller owns teardown.
    pub async fn run(mut self) -> ExitReason {
        let reason = loop {
            self.transition(ProcessorState::Reading);

            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    debug!(connection_id = self.session.connection_id, "Shutdown signal received");
                    break ExitReason::Shutdown;
                }

                Some(event) = self.outbound_rx.recv() => {
                    if let Err(reason) = self.write(&event).await {
                        break reason;
                    }
                }

                frame = self.transport.read_message() => match frame {
                    Ok(Some(message)) => {
                        if let Some(reason) = self.dispatch(message).await {
                            break reason;
                        }
                    }
                    Ok(None) => {
                        debug!(connection_id = self.session.connection_id, "Stream ended");
                        break ExitReason::EndOfStream;
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!(
                            connection_id = self.session.connection_id,
                            error = %e,
                            "Rejected inbound message"
                        );
                        let notice = format!("Message rejected: {}", e);
                        if let Err(reason) = self.write(&notice).await {
                            break reason;
                        }
                    }
                    Err(e) => break self.fail(e),
                },
            }
        };

        self.transition(ProcessorState::Closing);
        reason
    }

    /// Handle one inbound message. Returns a reason when the loop should stop.
    async fn dispatch(&mut self, message: String) -> Option<ExitReason> {
        self.transition(ProcessorState::Dispatching);

        if message == HEARTBEAT {
            trace!(connection_id = self.session.connection_id, "Heartbeat");
            return self.write(HEARTBEAT_ACK).await.err();
        }

        let response = self.interpreter.handle_input(self.session, &message);

        if let Some(text) = response.text() {
            if let Err(reason) = self.write(text).await {
                return Some(reason);
            }
        }
        match response {
            Response::Quit(_) => Some(ExitReason::Quit),
            Response::Reply(_) | Response::Silent => None,
        }
    }

    async fn write(&mut self, message: &str) -> Result<(), ExitReason> {
        self.transition(ProcessorState::Writing);
        match self.transport.write_message(message).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&self, e: MuddyError) -> ExitReason {
        error!(
            connection_id = self.session.connection_id,
            player = %self.session.display_name,
            error = %e,
            "Transport error"
        );
        ExitReason::TransportError
    }
}
