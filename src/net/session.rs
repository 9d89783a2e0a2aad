//! Session management module
//!
//! Manages player sessions including:
//! - Pending registrations handed out by login
//! - Promotion of a pending registration to an active, connection-bound session
//! - A fixed-capacity generational slot table of active sessions
//! - Connection-identity reverse index for teardown
//! - Room occupancy queries used by look and broadcasts

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{MuddyError, NetworkError, RegistryError, Result};
use crate::game::inventory::Inventory;
use crate::game::RoomId;

/// Identity of one accepted transport connection
pub type ConnectionId = u64;

/// Player identity; doubles as the opaque pending id handed out by login
pub type PlayerId = Uuid;

/// Index plus generation of an active-session slot.
///
/// A handle goes stale as soon as its slot is freed, even if the slot is
/// later reused by another player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub index: u32,
    pub generation: u32,
}

/// A player identity issued by login but not yet bound to a connection
#[derive(Debug, Clone)]
pub struct PendingPlayer {
    pub id: PlayerId,
    pub username: String,
    pub display_name: String,
    pub start_room: RoomId,
    pub registered_at: Instant,
}

impl PendingPlayer {
    /// Create a pending player with a fresh id
    pub fn new(username: impl Into<String>, start_room: RoomId) -> Self {
        let username = username.into();
        Self {
            id: Uuid::new_v4(),
            display_name: username.clone(),
            username,
            start_room,
            registered_at: Instant::now(),
        }
    }
}

/// An authenticated, connection-bound player context
pub struct Session {
    /// Slot handle in the registry
    pub handle: SessionHandle,
    /// Connection this session is bound to
    pub connection_id: ConnectionId,
    /// Player identity
    pub player_id: PlayerId,
    pub username: String,
    pub display_name: String,
    /// Time the session was bound
    pub connected_at: Instant,
    /// Current room
    room_id: RwLock<RoomId>,
    /// Carried items and gold
    inventory: Mutex<Inventory>,
    /// Pushed events waiting for the owning stream processor
    outbound_tx: mpsc::Sender<String>,
}

impl Session {
    fn new(
        handle: SessionHandle,
        connection_id: ConnectionId,
        pending: PendingPlayer,
        outbound_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            handle,
            connection_id,
            player_id: pending.id,
            username: pending.username,
            display_name: pending.display_name,
            connected_at: Instant::now(),
            room_id: RwLock::new(pending.start_room),
            inventory: Mutex::new(Inventory::new()),
            outbound_tx,
        }
    }

    /// Get the current room
    pub fn room_id(&self) -> RoomId {
        *self.room_id.read()
    }

    /// Move the player to another room
    pub fn set_room_id(&self, room_id: RoomId) {
        let mut current = self.room_id.write();
        debug!(
            player = %self.display_name,
            from = *current,
            to = room_id,
            "Room changed"
        );
        *current = room_id;
    }

    /// Run `f` with exclusive access to the inventory
    pub fn with_inventory<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Inventory) -> R,
    {
        f(&mut self.inventory.lock())
    }

    /// Snapshot of the inventory
    pub fn inventory(&self) -> Inventory {
        self.inventory.lock().clone()
    }

    /// Queue a message without waiting
    pub fn try_send(&self, message: String) -> Result<()> {
        self.outbound_tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MuddyError::Network(NetworkError::QueueFull),
            mpsc::error::TrySendError::Closed(_) => {
                MuddyError::Network(NetworkError::ConnectionClosed)
            }
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("connection_id", &self.connection_id)
            .field("player_id", &self.player_id)
            .field("display_name", &self.display_name)
            .field("room_id", &self.room_id())
            .field("connected_for", &self.connected_at.elapsed())
            .finish()
    }
}

/// One entry of the active-session table
#[derive(Default)]
struct Slot {
    generation: u32,
    session: Option<Arc<Session>>,
}

/// Everything guarded by the registry lock
struct RegistryInner {
    pending: HashMap<PlayerId, PendingPlayer>,
    slots: Vec<Slot>,
    by_connection: HashMap<ConnectionId, SessionHandle>,
    active: usize,
}

impl RegistryInner {
    fn is_player_active(&self, player_id: &PlayerId) -> bool {
        self.slots
            .iter()
            .filter_map(|slot| slot.session.as_ref())
            .any(|session| session.player_id == *player_id)
    }
}

/// Shared table of pending and active player sessions.
///
/// One reader/writer lock guards all state. Critical sections only do
/// bookkeeping; queued sends and logging of results happen after release.
pub struct SessionRegistry {
    capacity: usize,
    inner: RwLock<RegistryInner>,
    next_connection_id: AtomicU64,
}

impl SessionRegistry {
    /// Create a registry holding at most `capacity` pending plus active players
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            capacity,
            inner: RwLock::new(RegistryInner {
                pending: HashMap::new(),
                slots,
                by_connection: HashMap::new(),
                active: 0,
            }),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate an identity for a newly accepted connection
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a pending registration.
    ///
    /// Fails once pending plus active players reach capacity.
    pub fn register(&self, player: PendingPlayer) -> std::result::Result<(), RegistryError> {
        let mut inner = self.inner.write();

        if inner.active + inner.pending.len() >= self.capacity {
            drop(inner);
            warn!(username = %player.username, capacity = self.capacity, "Registration rejected, registry full");
            return Err(RegistryError::CapacityExceeded);
        }
        if inner.pending.contains_key(&player.id) || inner.is_player_active(&player.id) {
            return Err(RegistryError::AlreadyRegistered);
        }

        let id = player.id;
        let username = player.username.clone();
        inner.pending.insert(id, player);
        drop(inner);

        info!(player_id = %id, username = %username, "Player registered");
        Ok(())
    }

    /// Bind a pending registration to a connection, producing an active session.
    ///
    /// The pending entry is consumed only on success, so a failed attempt for
    /// lack of slots can be retried.
    pub fn connect(
        &self,
        pending_id: PlayerId,
        connection_id: ConnectionId,
        outbound_tx: mpsc::Sender<String>,
    ) -> std::result::Result<Arc<Session>, RegistryError> {
        let mut inner = self.inner.write();

        if inner.by_connection.contains_key(&connection_id) {
            drop(inner);
            error!(connection_id, "Connection is already bound to a session");
            debug_assert!(false, "connection {} bound twice", connection_id);
            return Err(RegistryError::AlreadyBound(connection_id));
        }
        if !inner.pending.contains_key(&pending_id) {
            return Err(RegistryError::NotFound);
        }

        let index = inner
            .slots
            .iter()
            .position(|slot| slot.session.is_none())
            .ok_or(RegistryError::Exhausted)?;
        let pending = inner
            .pending
            .remove(&pending_id)
            .ok_or(RegistryError::NotFound)?;

        let slot = &mut inner.slots[index];
        let handle = SessionHandle {
            index: index as u32,
            generation: slot.generation,
        };
        let session = Arc::new(Session::new(handle, connection_id, pending, outbound_tx));
        slot.session = Some(Arc::clone(&session));
        inner.by_connection.insert(connection_id, handle);
        inner.active += 1;
        drop(inner);

        info!(
            connection_id,
            player_id = %session.player_id,
            player = %session.display_name,
            slot = handle.index,
            "Session connected"
        );
        Ok(session)
    }

    /// Free the slot bound to a connection.
    ///
    /// Returns false when the connection has no session, which makes repeated
    /// calls harmless.
    pub fn disconnect(&self, connection_id: ConnectionId) -> bool {
        let mut inner = self.inner.write();

        let Some(handle) = inner.by_connection.remove(&connection_id) else {
            return false;
        };
        let slot = &mut inner.slots[handle.index as usize];
        if slot.generation != handle.generation {
            drop(inner);
            error!(connection_id, ?handle, "Reverse index pointed at a reused slot");
            debug_assert!(false, "stale handle in reverse index");
            return false;
        }
        let session = slot.session.take();
        slot.generation = slot.generation.wrapping_add(1);
        if session.is_some() {
            inner.active -= 1;
        }
        drop(inner);

        if let Some(session) = session {
            info!(
                connection_id,
                player = %session.display_name,
                "Session disconnected"
            );
        }
        true
    }

    /// Look up a session by handle; stale handles resolve to nothing
    pub fn get(&self, handle: SessionHandle) -> Option<Arc<Session>> {
        let inner = self.inner.read();
        let slot = inner.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.session.clone()
    }

    /// Look up the session bound to a connection
    pub fn get_by_connection(&self, connection_id: ConnectionId) -> Option<Arc<Session>> {
        let inner = self.inner.read();
        let handle = *inner.by_connection.get(&connection_id)?;
        inner.slots[handle.index as usize].session.clone()
    }

    /// Snapshot of all active sessions
    pub fn active_sessions(&self) -> Vec<Arc<Session>> {
        self.inner
            .read()
            .slots
            .iter()
            .filter_map(|slot| slot.session.clone())
            .collect()
    }

    /// Snapshot of active sessions in a room, optionally leaving one player out
    pub fn sessions_in_room(
        &self,
        room_id: RoomId,
        exclude: Option<PlayerId>,
    ) -> Vec<Arc<Session>> {
        self.active_sessions()
            .into_iter()
            .filter(|session| session.room_id() == room_id)
            .filter(|session| Some(session.player_id) != exclude)
            .collect()
    }

    /// Whether a player currently has an active session
    pub fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.inner.read().is_player_active(player_id)
    }

    pub fn is_pending(&self, player_id: &PlayerId) -> bool {
        self.inner.read().pending.contains_key(player_id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.read().active
    }

    pub fn pending_count(&self) -> usize {
        self.inner.read().pending.len()
    }

    /// Drop a pending registration
    pub fn remove_pending(&self, player_id: &PlayerId) -> bool {
        self.inner.write().pending.remove(player_id).is_some()
    }

    /// Drop pending registrations older than `ttl`, returning how many were removed
    pub fn reap_expired_pending(&self, ttl: Duration) -> usize {
        let mut inner = self.inner.write();
        let before = inner.pending.len();
        inner
            .pending
            .retain(|_, pending| pending.registered_at.elapsed() < ttl);
        let reaped = before - inner.pending.len();
        drop(inner);

        if reaped > 0 {
            info!(reaped, "Expired pending registrations removed");
        }
        reaped
    }
}

/// Periodically drop stale pending registrations until shutdown
pub async fn run_pending_reaper(
    registry: Arc<SessionRegistry>,
    ttl: Duration,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(ttl_secs = ttl.as_secs(), "Pending reaper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                registry.reap_expired_pending(ttl);
            }
            _ = shutdown_rx.recv() => {
                debug!("Pending reaper stopping");
                break;
            }
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("capacity", &self.capacity)
            .field("active", &self.active_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}
