//! Item module
//!
//! Items are plain values that live in exactly one place at a time: a room's
//! item set, a player's inventory, or a merchant's stock.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest item name a room may hold or a player may name in a command
pub const MAX_ITEM_NAME_LEN: usize = 32;

/// A single item in the world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Display name, matched case-insensitively
    pub name: String,
    /// Short description shown in listings
    pub description: String,
    /// Gold a merchant pays for it
    #[serde(default)]
    pub value: u32,
}

impl Item {
    /// Create a new item
    pub fn new(name: impl Into<String>, description: impl Into<String>, value: u32) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value,
        }
    }

    /// Lookup key used by room item sets
    pub fn key(&self) -> String {
        item_key(&self.name)
    }

    /// Case-insensitive name comparison, using the same folding as room keys
    pub fn is_named(&self, name: &str) -> bool {
        self.key() == item_key(name)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.description)
    }
}

/// Normalize a player-supplied name into a lookup key.
///
/// Items and NPCs are both matched through this, so anything a room lookup
/// finds can also be found in an inventory.
pub fn item_key(name: &str) -> String {
    name.trim().to_lowercase()
}
