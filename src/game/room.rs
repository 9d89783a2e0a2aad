//! Room module
//!
//! Rooms are created once at world load. Their exits never change, but each
//! room's item set is mutable and guarded by its own lock.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::game::item::{item_key, Item};
use crate::game::npc::Npc;
use crate::game::world::RoomId;

/// Compass direction of a room exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All directions in listing order
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Lowercase name as typed by players
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }

    /// Capitalized name used in room listings
    pub fn label(&self) -> &'static str {
        match self {
            Direction::North => "North",
            Direction::South => "South",
            Direction::East => "East",
            Direction::West => "West",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|dir| dir.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::InvalidDirection(s.to_string()))
    }
}

/// A directed, optionally locked edge to another room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    /// Destination room
    pub room_id: RoomId,
    /// Locked doors cannot be passed
    #[serde(default)]
    pub locked: bool,
}

impl Door {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            locked: false,
        }
    }

    pub fn locked(room_id: RoomId) -> Self {
        Self {
            room_id,
            locked: true,
        }
    }
}

/// The four optional exits of a room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub north: Option<Door>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub south: Option<Door>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub east: Option<Door>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub west: Option<Door>,
}

impl Exits {
    /// Door in the given direction, if any
    pub fn get(&self, direction: Direction) -> Option<&Door> {
        match direction {
            Direction::North => self.north.as_ref(),
            Direction::South => self.south.as_ref(),
            Direction::East => self.east.as_ref(),
            Direction::West => self.west.as_ref(),
        }
    }

    /// Present exits in listing order
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &Door)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| self.get(dir).map(|door| (dir, door)))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

/// A room in the world graph
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub exits: Exits,
    npcs: Vec<Npc>,
    /// Keyed by lowercase item name
    items: Mutex<BTreeMap<String, Item>>,
}

impl Room {
    /// Create an empty room
    pub fn new(id: RoomId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            exits: Exits::default(),
            npcs: Vec::new(),
            items: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_exits(mut self, exits: Exits) -> Self {
        self.exits = exits;
        self
    }

    pub fn with_npcs(mut self, npcs: Vec<Npc>) -> Self {
        self.npcs = npcs;
        self
    }

    /// Name and description, as shown when entering
    pub fn basic_info(&self) -> String {
        format!("{}\n{}", self.name, self.description)
    }

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    /// Find an NPC by case-insensitive name
    pub fn npc(&self, name: &str) -> Option<&Npc> {
        let key = item_key(name);
        self.npcs.iter().find(|npc| item_key(&npc.name) == key)
    }

    /// Snapshot of the items currently in the room
    pub fn items(&self) -> Vec<Item> {
        self.items.lock().values().cloned().collect()
    }

    pub fn item_count(&self) -> usize {
        self.items.lock().len()
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.items.lock().contains_key(&item_key(name))
    }

    /// Place an item in the room. Returns false if one with the same name is already here.
    pub fn add_item(&self, item: Item) -> bool {
        let mut items = self.items.lock();
        let key = item.key();
        if items.contains_key(&key) {
            return false;
        }
        items.insert(key, item);
        true
    }

    /// Remove an item by case-insensitive name
    pub fn take_item(&self, name: &str) -> Option<Item> {
        self.items.lock().remove(&item_key(name))
    }

    /// Remove an item and hand it to `receive` while the room's item lock is held,
    /// so no other player can observe the item in both places or in neither.
    pub fn take_item_with<R>(&self, name: &str, receive: impl FnOnce(Item) -> R) -> Option<R> {
        let mut items = self.items.lock();
        let item = items.remove(&item_key(name))?;
        Some(receive(item))
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("exits", &self.exits)
            .field("npcs", &self.npcs.len())
            .field("items", &self.item_count())
            .finish()
    }
}
