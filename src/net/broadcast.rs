//! Event broadcast module
//!
//! Pushes room events to every occupant's outbound queue. Events share the
//! stream with command responses, so each is sent as the `event:` sentinel
//! followed by a JSON envelope.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::Result;
use crate::game::RoomId;
use crate::net::session::{PlayerId, SessionRegistry};

/// Marks a pushed event on a multiplexed stream
pub const EVENT_PREFIX: &str = "event:";

/// Kinds of pushed events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A player spoke in the room
    RoomChat,
    /// A player entered the room or the world
    PlayerArrived,
    /// A player left the room or the world
    PlayerDeparted,
}

/// Event envelope as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub data: String,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(kind: EventKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            data: data.into(),
        }
    }

    /// Room chat line, `<name>: <message>`
    pub fn room_chat(display_name: &str, message: &str) -> Self {
        Self::new(EventKind::RoomChat, format!("{}: {}", display_name, message))
    }

    /// Sentinel-prefixed wire form
    pub fn encode(&self) -> Result<String> {
        Ok(format!("{}{}", EVENT_PREFIX, serde_json::to_string(self)?))
    }

    /// Parse a wire message back into an event, if it is one
    pub fn decode(message: &str) -> Option<Self> {
        let json = message.strip_prefix(EVENT_PREFIX)?;
        serde_json::from_str(json).ok()
    }
}

/// Delivers events to the sessions in a room
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<SessionRegistry>,
}

impl EventBroadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Queue an event for every session in `room_id` except `exclude`.
    ///
    /// A failed delivery is logged and skipped. Returns how many sessions
    /// the event was queued for.
    pub fn send_to_room(
        &self,
        room_id: RoomId,
        event: &Event,
        exclude: Option<PlayerId>,
    ) -> Result<usize> {
        let payload = event.encode()?;
        let recipients = self.registry.sessions_in_room(room_id, exclude);

        let mut delivered = 0;
        for session in &recipients {
            match session.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    player = %session.display_name,
                    room_id,
                    error = %e,
                    "Event delivery failed"
                ),
            }
        }

        trace!(
            room_id,
            kind = ?event.kind,
            recipients = recipients.len(),
            delivered,
            "Event broadcast"
        );
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::session::PendingPlayer;
    use tokio::sync::mpsc;

    fn connect(
        registry: &SessionRegistry,
        name: &str,
        connection_id: u64,
        queue: usize,
    ) -> (PlayerId, mpsc::Receiver<String>) {
        let pending = PendingPlayer::new(name, 3);
        let id = pending.id;
        registry.register(pending).unwrap();
        let (tx, rx) = mpsc::channel(queue);
        registry.connect(id, connection_id, tx).unwrap();
        (id, rx)
    }

    #[test]
    fn test_envelope_format() {
        let event = Event::room_chat("ann", "hello");
        let wire = event.encode().unwrap();

        assert!(wire.starts_with("event:{"));
        let json: serde_json::Value = serde_json::from_str(&wire["event:".len()..]).unwrap();
        assert_eq!(json["type"], "RoomChat");
        assert_eq!(json["data"], "ann: hello");
        assert!(json["timestamp"].is_string());

        assert_eq!(Event::decode(&wire), Some(event));
        assert_eq!(Event::decode("You move to the north"), None);
    }

    #[test]
    fn test_send_to_room_reaches_occupants_only() {
        let registry = Arc::new(SessionRegistry::new(4));
        let (_ann, mut ann_rx) = connect(&registry, "ann", 1, 4);
        let (_bob, mut bob_rx) = connect(&registry, "bob", 2, 4);
        let (_cy, mut cy_rx) = connect(&registry, "cy", 3, 4);
        registry.get_by_connection(3).unwrap().set_room_id(1);

        let broadcaster = EventBroadcaster::new(Arc::clone(&registry));
        let delivered = broadcaster
            .send_to_room(3, &Event::room_chat("ann", "hello"), None)
            .unwrap();

        assert_eq!(delivered, 2);
        assert!(ann_rx.try_recv().unwrap().contains("hello"));
        assert!(bob_rx.try_recv().unwrap().contains("hello"));
        assert!(cy_rx.try_recv().is_err());
    }

    #[test]
    fn test_send_to_room_with_exclusion() {
        let registry = Arc::new(SessionRegistry::new(4));
        let (ann, mut ann_rx) = connect(&registry, "ann", 1, 4);
        let (_bob, mut bob_rx) = connect(&registry, "bob", 2, 4);

        let broadcaster = EventBroadcaster::new(Arc::clone(&registry));
        let event = Event::new(EventKind::PlayerArrived, "ann arrives.");
        assert_eq!(broadcaster.send_to_room(3, &event, Some(ann)).unwrap(), 1);

        assert!(ann_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_ok());
    }

    #[test]
    fn test_failed_recipient_does_not_stop_delivery() {
        let registry = Arc::new(SessionRegistry::new(4));
        let (_ann, ann_rx) = connect(&registry, "ann", 1, 4);
        let (_bob, mut bob_rx) = connect(&registry, "bob", 2, 1);
        let (_cy, mut cy_rx) = connect(&registry, "cy", 3, 4);
        drop(ann_rx);

        let broadcaster = EventBroadcaster::new(Arc::clone(&registry));
        let first = Event::room_chat("cy", "one");
        let second = Event::room_chat("cy", "two");

        // ann's queue is closed
        assert_eq!(broadcaster.send_to_room(3, &first, None).unwrap(), 2);
        // bob's single-slot queue is now full
        assert_eq!(broadcaster.send_to_room(3, &second, None).unwrap(), 1);

        assert!(bob_rx.try_recv().unwrap().contains("one"));
        assert!(bob_rx.try_recv().is_err());
        assert!(cy_rx.try_recv().unwrap().contains("one"));
        assert!(cy_rx.try_recv().unwrap().contains("two"));
    }
}
