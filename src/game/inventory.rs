//! Inventory module
//!
//! Items a player carries plus their gold balance.

use crate::game::item::Item;

/// Player inventory storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    items: Vec<Item>,
    gold: u64,
}

impl Inventory {
    /// Create a new empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of carried items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn gold(&self) -> u64 {
        self.gold
    }

    /// Append an item
    pub fn add(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Check whether an item with this name is carried
    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.is_named(name))
    }

    /// Remove the first item with this name (case-insensitive)
    pub fn remove(&mut self, name: &str) -> Option<Item> {
        let index = self.items.iter().position(|item| item.is_named(name))?;
        Some(self.items.remove(index))
    }

    pub fn add_gold(&mut self, amount: u64) {
        self.gold = self.gold.saturating_add(amount);
    }

    /// Render the inventory listing shown to the player
    pub fn render(&self) -> String {
        let mut out = format!("You have {} gold\n", self.gold);
        if self.items.is_empty() {
            out.push_str("Your inventory is empty.\n");
            return out;
        }

        out.push_str("Your inventory contains:\n");
        for item in &self.items {
            out.push_str(&format!("- {}\n", item));
        }
        out
    }
}
