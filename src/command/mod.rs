//! Command module
//!
//! Turns one inbound line of player text into a typed [`Command`].
//!
//! Parsing normalizes whitespace, then tries each matcher in a fixed table
//! order and returns the first match. Keywords and directions are
//! case-insensitive; free text keeps its case.

mod parser;

pub use parser::{normalize, parse, MAX_SAY_LEN};

use crate::game::Direction;

/// A parsed player command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `move <direction>`
    Move(Direction),
    /// `say <message>`
    Say(String),
    /// `pickup <item>`
    Pickup(String),
    /// `look`
    Look,
    /// `inventory`
    Inventory,
    /// `help`
    Help,
    /// `talk <npc>`
    Talk(String),
    /// `sell <item> to <npc>`
    Sell { item: String, npc: String },
    /// `quit`
    Quit,
}

impl Command {
    /// Keyword that introduces this command
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Move(_) => "move",
            Command::Say(_) => "say",
            Command::Pickup(_) => "pickup",
            Command::Look => "look",
            Command::Inventory => "inventory",
            Command::Help => "help",
            Command::Talk(_) => "talk",
            Command::Sell { .. } => "sell",
            Command::Quit => "quit",
        }
    }
}
