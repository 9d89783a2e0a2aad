//! NPC module
//!
//! Non-player characters are fixed to the room they are defined in. Merchants
//! buy items from players and keep what they bought.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::game::item::Item;

/// What an NPC does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NpcKind {
    /// Buys items for gold
    Merchant,
    /// Only talks
    #[default]
    Townsfolk,
}

/// NPC as written in the world file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub greeting: String,
    #[serde(default)]
    pub kind: NpcKind,
}

/// A non-player character
pub struct Npc {
    pub name: String,
    pub description: String,
    pub greeting: String,
    pub kind: NpcKind,
    stock: Mutex<Vec<Item>>,
}

impl Npc {
    pub fn new(name: impl Into<String>, kind: NpcKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            greeting: String::new(),
            kind,
            stock: Mutex::new(Vec::new()),
        }
    }

    pub fn is_merchant(&self) -> bool {
        self.kind == NpcKind::Merchant
    }

    /// Name with role, as shown in room listings
    pub fn title(&self) -> String {
        match self.kind {
            NpcKind::Merchant => format!("{} the merchant", self.name),
            NpcKind::Townsfolk => self.name.clone(),
        }
    }

    /// What the NPC says when talked to
    pub fn talk(&self) -> String {
        if self.greeting.is_empty() {
            format!("{} nods at you.", self.name)
        } else {
            format!("{} says: {}", self.name, self.greeting)
        }
    }

    /// Take ownership of an item sold to this NPC
    pub fn receive(&self, item: Item) {
        self.stock.lock().push(item);
    }

    /// Snapshot of items this NPC holds
    pub fn stock(&self) -> Vec<Item> {
        self.stock.lock().clone()
    }
}

impl From<NpcDefinition> for Npc {
    fn from(def: NpcDefinition) -> Self {
        Self {
            name: def.name,
            description: def.description,
            greeting: def.greeting,
            kind: def.kind,
            stock: Mutex::new(Vec::new()),
        }
    }
}

impl fmt::Debug for Npc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Npc")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
