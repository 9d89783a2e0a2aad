//! Player-facing message text

pub const MESSAGE_INVALID_CMD: &str = "You can't do that";
pub const MESSAGE_INVALID_MOVE: &str = "You can't move there";
pub const MESSAGE_DOOR_LOCKED: &str = "The door seems to be locked";
pub const MESSAGE_VOID: &str = "The void..no there is a bug here";
pub const MESSAGE_EMPTY_ROOM: &str = "There is nothing of interest here.";

pub const MESSAGE_NO_NPC_TO_SELL: &str = "There is no such NPC here to sell to.";
pub const MESSAGE_NOT_MERCHANT: &str = "You can only sell items to merchants.";
pub const MESSAGE_NO_ITEM_TO_SELL: &str = "You don't have that item to sell.";

pub const HELP_TEXT: &str = "Available commands:
  look                   Describe the room you are in
  move <direction>       Walk north, south, east or west
  say <message>          Speak to everyone in the room
  pickup <item>          Pick up an item in the room
  inventory              List what you are carrying
  talk <npc>             Talk to someone in the room
  sell <item> to <npc>   Sell an item to a merchant
  help                   Show this message
  quit                   Leave the world";
