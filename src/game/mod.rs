//! Game module
//!
//! This module contains the world model and the rules that act on it:
//! - World graph loading and room lookup
//! - Rooms, doors, items and NPCs
//! - Player inventories
//! - Command execution against shared state

pub mod interpreter;
pub mod inventory;
pub mod item;
pub mod messages;
pub mod npc;
pub mod room;
pub mod world;

pub use interpreter::{CommandInterpreter, Response};
pub use inventory::Inventory;
pub use item::Item;
pub use npc::{Npc, NpcKind};
pub use room::{Direction, Door, Exits, Room};
pub use world::{RoomId, World};
