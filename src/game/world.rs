//! World module
//!
//! The room graph loaded once at startup. Topology is read-only after load;
//! only per-room item sets and merchant stock change at runtime, each behind
//! its own lock.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WorldError};
use crate::game::item::{Item, MAX_ITEM_NAME_LEN};
use crate::game::npc::{Npc, NpcDefinition};
use crate::game::room::{Exits, Room};

/// Room identifier as used in world files
pub type RoomId = u32;

/// Default room new players appear in
pub const DEFAULT_START_ROOM: RoomId = 1;

fn default_start_room() -> RoomId {
    DEFAULT_START_ROOM
}

/// World file root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldDefinition {
    #[serde(default = "default_start_room")]
    pub start_room: RoomId,
    pub rooms: Vec<RoomDefinition>,
}

/// Room as written in the world file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDefinition {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub exits: Exits,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub npcs: Vec<NpcDefinition>,
}

/// The loaded world
pub struct World {
    rooms: HashMap<RoomId, Room>,
    start_room: RoomId,
}

impl World {
    /// Build a world from its definition, checking that the graph is closed
    pub fn from_definition(def: WorldDefinition) -> std::result::Result<Self, WorldError> {
        if def.rooms.is_empty() {
            return Err(WorldError::Empty);
        }

        let mut ids = HashSet::with_capacity(def.rooms.len());
        for room in &def.rooms {
            if !ids.insert(room.id) {
                return Err(WorldError::DuplicateRoom(room.id));
            }
        }
        if !ids.contains(&def.start_room) {
            return Err(WorldError::RoomNotFound(def.start_room));
        }

        let mut rooms = HashMap::with_capacity(def.rooms.len());
        for room_def in def.rooms {
            for (_, door) in room_def.exits.iter() {
                if !ids.contains(&door.room_id) {
                    return Err(WorldError::DanglingExit {
                        from: room_def.id,
                        to: door.room_id,
                    });
                }
            }

            let npcs = room_def.npcs.into_iter().map(Npc::from).collect();
            let room = Room::new(room_def.id, room_def.name, room_def.description)
                .with_exits(room_def.exits)
                .with_npcs(npcs);

            for item in room_def.items {
                if item.name.chars().count() > MAX_ITEM_NAME_LEN {
                    return Err(WorldError::ItemNameTooLong(item.name));
                }
                let name = item.name.clone();
                if !room.add_item(item) {
                    return Err(WorldError::DuplicateItem {
                        room: room.id,
                        name,
                    });
                }
            }

            debug!(room_id = room.id, name = %room.name, "Room loaded");
            rooms.insert(room.id, room);
        }

        Ok(Self {
            rooms,
            start_room: def.start_room,
        })
    }

    /// Parse a JSON world definition
    pub fn from_json(json: &str) -> Result<Self> {
        let def: WorldDefinition = serde_json::from_str(json)?;
        Ok(Self::from_definition(def)?)
    }

    /// Load a world file from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let world = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            rooms = world.room_count(),
            start_room = world.start_room,
            "World loaded"
        );
        Ok(world)
    }

    /// Look up a room by id
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn start_room(&self) -> RoomId {
        self.start_room
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("rooms", &self.rooms.len())
            .field("start_room", &self.start_room)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Small world used across unit tests.
    ///
    /// 1 Town Square: north to 2, east to 3, west (locked) to 4
    /// 3 Market: a merchant and a lantern
    pub const SAMPLE_WORLD: &str = r#"{
        "start_room": 1,
        "rooms": [
            {
                "id": 1,
                "name": "Town Square",
                "description": "A cobbled square with a dry fountain.",
                "exits": {
                    "north": { "room_id": 2 },
                    "east": { "room_id": 3 },
                    "west": { "room_id": 4, "locked": true }
                },
                "items": [
                    { "name": "Rusty Key", "description": "An old iron key", "value": 5 }
                ]
            },
            {
                "id": 2,
                "name": "North Road",
                "description": "A muddy road leading out of town.",
                "exits": { "south": { "room_id": 1 } }
            },
            {
                "id": 3,
                "name": "Market",
                "description": "Stalls crowd the narrow street.",
                "exits": { "west": { "room_id": 1 } },
                "items": [
                    { "name": "Lantern", "description": "It flickers weakly", "value": 12 }
                ],
                "npcs": [
                    { "name": "Gus", "description": "A stout trader", "greeting": "Got anything to sell?", "kind": "merchant" },
                    { "name": "Mira", "description": "A farmer resting her feet" }
                ]
            },
            {
                "id": 4,
                "name": "Vault",
                "description": "Cold stone walls.",
                "exits": { "east": { "room_id": 1 } }
            }
        ]
    }"#;

    pub fn sample_world() -> World {
        World::from_json(SAMPLE_WORLD).expect("sample world is valid")
    }
}
