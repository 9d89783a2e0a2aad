//! Command interpreter
//!
//! Executes parsed commands for one session against the shared world and
//! session registry. Execution never blocks on I/O: cross-player effects are
//! queued through the [`EventBroadcaster`].

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::command::{self, Command};
use crate::error::ParseError;
use crate::game::messages::*;
use crate::game::room::{Direction, Room};
use crate::game::world::{RoomId, World};
use crate::net::broadcast::{Event, EventBroadcaster, EventKind};
use crate::net::session::{PlayerId, Session, SessionRegistry};

/// What the stream processor should do with a command's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Write this text back to the sender
    Reply(String),
    /// Nothing to write; any effect was broadcast
    Silent,
    /// Write this text, then close the connection
    Quit(String),
}

impl Response {
    /// Text to write, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Response::Reply(text) | Response::Quit(text) => Some(text),
            Response::Silent => None,
        }
    }
}

/// Parses and executes player commands
pub struct CommandInterpreter {
    world: Arc<World>,
    registry: Arc<SessionRegistry>,
    broadcaster: EventBroadcaster,
}

impl CommandInterpreter {
    pub fn new(world: Arc<World>, registry: Arc<SessionRegistry>) -> Self {
        let broadcaster = EventBroadcaster::new(Arc::clone(&registry));
        Self {
            world,
            registry,
            broadcaster,
        }
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Parse one inbound line and execute it
    pub fn handle_input(&self, session: &Session, input: &str) -> Response {
        match command::parse(input) {
            Ok(command) => {
                debug!(
                    player = %session.display_name,
                    command = command.keyword(),
                    "Executing command"
                );
                self.execute(session, command)
            }
            Err(ParseError::Empty) => Response::Silent,
            Err(e) => {
                debug!(player = %session.display_name, error = %e, "Unparseable input");
                Response::Reply(format!(
                    "{}: \"{}\"",
                    MESSAGE_INVALID_CMD,
                    command::normalize(input)
                ))
            }
        }
    }

    /// Execute a parsed command
    pub fn execute(&self, session: &Session, command: Command) -> Response {
        match command {
            Command::Move(direction) => Response::Reply(self.move_player(session, direction)),
            Command::Say(message) => {
                self.say(session, &message);
                Response::Silent
            }
            Command::Pickup(name) => Response::Reply(self.pickup(session, &name)),
            Command::Look => Response::Reply(self.look(session)),
            Command::Inventory => Response::Reply(session.inventory().render()),
            Command::Help => Response::Reply(HELP_TEXT.to_string()),
            Command::Talk(name) => Response::Reply(self.talk(session, &name)),
            Command::Sell { item, npc } => Response::Reply(self.sell(session, &item, &npc)),
            Command::Quit => Response::Quit(format!("Farewell, {}.", session.display_name)),
        }
    }

    /// Greeting written right after a session is bound
    pub fn welcome(&self, session: &Session) -> String {
        let mut text = format!("Greetings {}!", session.display_name);
        if let Some(room) = self.world.room(session.room_id()) {
            text.push('\n');
            text.push_str(&room.basic_info());
        }
        text
    }

    /// Tell the room a player has entered the world
    pub fn announce_arrival(&self, session: &Session) {
        let event = Event::new(
            EventKind::PlayerArrived,
            format!("{} has entered the world.", session.display_name),
        );
        self.broadcast(session.room_id(), &event, Some(session.player_id));
    }

    /// Tell the room a player has left the world
    pub fn announce_departure(&self, session: &Session) {
        let event = Event::new(
            EventKind::PlayerDeparted,
            format!("{} has left the world.", session.display_name),
        );
        self.broadcast(session.room_id(), &event, Some(session.player_id));
    }

    fn broadcast(&self, room_id: RoomId, event: &Event, exclude: Option<PlayerId>) {
        if let Err(e) = self.broadcaster.send_to_room(room_id, event, exclude) {
            warn!(room_id, error = %e, "Failed to encode event");
        }
    }

    fn current_room(&self, session: &Session) -> Option<&Room> {
        let room_id = session.room_id();
        let room = self.world.room(room_id);
        if room.is_none() {
            error!(player = %session.display_name, room_id, "Session is in an unknown room");
        }
        room
    }

    fn move_player(&self, session: &Session, direction: Direction) -> String {
        let Some(room) = self.current_room(session) else {
            return MESSAGE_VOID.to_string();
        };
        let Some(door) = room.exits.get(direction) else {
            return MESSAGE_INVALID_MOVE.to_string();
        };
        if door.locked {
            return MESSAGE_DOOR_LOCKED.to_string();
        }
        let Some(destination) = self.world.room(door.room_id) else {
            error!(from = room.id, to = door.room_id, "Door leads to an unknown room");
            return MESSAGE_VOID.to_string();
        };

        session.set_room_id(destination.id);

        let departed = Event::new(
            EventKind::PlayerDeparted,
            format!("{} leaves to the {}.", session.display_name, direction),
        );
        self.broadcast(room.id, &departed, Some(session.player_id));
        let arrived = Event::new(
            EventKind::PlayerArrived,
            format!("{} arrives.", session.display_name),
        );
        self.broadcast(destination.id, &arrived, Some(session.player_id));

        format!(
            "You move to the {}\nYou entered the {}",
            direction,
            destination.basic_info()
        )
    }

    fn say(&self, session: &Session, message: &str) {
        let event = Event::room_chat(&session.display_name, message);
        self.broadcast(session.room_id(), &event, None);
    }

    fn pickup(&self, session: &Session, name: &str) -> String {
        let Some(room) = self.current_room(session) else {
            return MESSAGE_VOID.to_string();
        };

        // Room lock first, then inventory
        let picked = room.take_item_with(name, |item| {
            session.with_inventory(|inventory| {
                let picked = item.name.clone();
                inventory.add(item);
                picked
            })
        });

        match picked {
            Some(item_name) => {
                debug!(player = %session.display_name, item = %item_name, room_id = room.id, "Item picked up");
                format!("You picked up the {}", item_name)
            }
            None => format!("There is no {} here", name),
        }
    }

    fn look(&self, session: &Session) -> String {
        let Some(room) = self.current_room(session) else {
            return MESSAGE_VOID.to_string();
        };
        let others: Vec<String> = self
            .registry
            .sessions_in_room(room.id, Some(session.player_id))
            .iter()
            .map(|other| other.display_name.clone())
            .collect();

        let mut sections = Vec::new();

        if room.exits.count() > 0 {
            let mut text = format!("You see {} exit(s):", room.exits.count());
            for (direction, _) in room.exits.iter() {
                text.push_str(&format!("\n> {}", direction.label()));
            }
            sections.push(text);
        }

        let items = room.items();
        if !items.is_empty() {
            let mut text = String::from("You see the following items in the room:");
            for item in &items {
                text.push_str(&format!("\n- {}", item));
            }
            sections.push(text);
        }

        if !others.is_empty() {
            let mut text = format!("You see {} player(s):", others.len());
            for name in &others {
                text.push_str(&format!("\n- {}", name));
            }
            sections.push(text);
        }

        if !room.npcs().is_empty() {
            let mut text = String::from("You see the following NPCs in the room:");
            for npc in room.npcs() {
                text.push_str(&format!("\n- {}", npc.title()));
            }
            sections.push(text);
        }

        if sections.is_empty() {
            sections.push(MESSAGE_EMPTY_ROOM.to_string());
        }

        format!("You look around the room\n{}", sections.join("\n"))
    }

    fn talk(&self, session: &Session, name: &str) -> String {
        let Some(room) = self.current_room(session) else {
            return MESSAGE_VOID.to_string();
        };
        match room.npc(name) {
            Some(npc) => npc.talk(),
            None => format!("There is no one called {} here.", name),
        }
    }

    fn sell(&self, session: &Session, item_name: &str, npc_name: &str) -> String {
        let Some(room) = self.current_room(session) else {
            return MESSAGE_VOID.to_string();
        };
        let Some(npc) = room.npc(npc_name) else {
            return MESSAGE_NO_NPC_TO_SELL.to_string();
        };
        if !npc.is_merchant() {
            return MESSAGE_NOT_MERCHANT.to_string();
        }

        let sold = session.with_inventory(|inventory| {
            let item = inventory.remove(item_name)?;
            inventory.add_gold(u64::from(item.value));
            Some(item)
        });
        let Some(item) = sold else {
            return MESSAGE_NO_ITEM_TO_SELL.to_string();
        };

        let reply = format!(
            "You sold the {} to {} for {} gold.",
            item.name, npc.name, item.value
        );
        debug!(player = %session.display_name, item = %item.name, merchant = %npc.name, "Item sold");
        npc.receive(item);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::fixtures::sample_world;
    use crate::game::Item;
    use crate::net::session::PendingPlayer;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    struct Harness {
        interpreter: CommandInterpreter,
        registry: Arc<SessionRegistry>,
        next_connection: u64,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(SessionRegistry::new(8));
            let interpreter = CommandInterpreter::new(Arc::new(sample_world()), Arc::clone(&registry));
            Self {
                interpreter,
                registry,
                next_connection: 1,
            }
        }

        fn join(&mut self, name: &str, room: RoomId) -> (Arc<Session>, mpsc::Receiver<String>) {
            let pending = PendingPlayer::new(name, room);
            let id = pending.id;
            self.registry.register(pending).unwrap();
            let (tx, rx) = mpsc::channel(16);
            let session = self.registry.connect(id, self.next_connection, tx).unwrap();
            self.next_connection += 1;
            (session, rx)
        }

        fn run(&self, session: &Session, input: &str) -> Response {
            self.interpreter.handle_input(session, input)
        }

        fn reply(&self, session: &Session, input: &str) -> String {
            match self.run(session, input) {
                Response::Reply(text) => text,
                other => panic!("expected a reply, got {:?}", other),
            }
        }
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            events.push(Event::decode(&message).expect("queued message is an event"));
        }
        events
    }

    #[test]
    fn test_move_through_unlocked_door() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);

        let reply = h.reply(&p, "move north");
        assert!(reply.contains("north"));
        assert_eq!(
            reply,
            "You move to the north\nYou entered the North Road\nA muddy road leading out of town."
        );
        assert_eq!(p.room_id(), 2);
    }

    #[test]
    fn test_move_into_locked_door() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);

        assert_eq!(h.reply(&p, "move west"), MESSAGE_DOOR_LOCKED);
        assert_eq!(p.room_id(), 1);
    }

    #[test]
    fn test_move_without_exit() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 2);

        assert_eq!(h.reply(&p, "move east"), MESSAGE_INVALID_MOVE);
        assert_eq!(p.room_id(), 2);
    }

    #[test]
    fn test_move_from_unknown_room() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 42);

        assert_eq!(h.reply(&p, "move north"), MESSAGE_VOID);
        assert_eq!(p.room_id(), 42);
    }

    #[test]
    fn test_move_announces_to_both_rooms() {
        let mut h = Harness::new();
        let (mover, mut mover_rx) = h.join("pat", 1);
        let (_stayer, mut stayer_rx) = h.join("sam", 1);
        let (_waiter, mut waiter_rx) = h.join("wes", 2);

        h.reply(&mover, "move north");

        let left = drain(&mut stayer_rx);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kind, EventKind::PlayerDeparted);
        assert_eq!(left[0].data, "pat leaves to the north.");

        let arrived = drain(&mut waiter_rx);
        assert_eq!(arrived.len(), 1);
        assert_eq!(arrived[0].data, "pat arrives.");

        assert!(drain(&mut mover_rx).is_empty());
    }

    #[test]
    fn test_say_reaches_everyone_in_room() {
        let mut h = Harness::new();
        let (a, mut a_rx) = h.join("ann", 3);
        let (_b, mut b_rx) = h.join("bob", 3);
        let (_c, mut c_rx) = h.join("cy", 1);

        assert_eq!(h.run(&a, "say hello"), Response::Silent);

        let heard = drain(&mut b_rx);
        assert_eq!(heard.len(), 1);
        assert_eq!(heard[0].kind, EventKind::RoomChat);
        assert_eq!(heard[0].data, "ann: hello");

        let echoed = drain(&mut a_rx);
        assert_eq!(echoed.len(), 1);
        assert_eq!(echoed[0].data, "ann: hello");

        assert!(drain(&mut c_rx).is_empty());
    }

    #[test]
    fn test_pickup_present_item() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);

        assert_eq!(h.reply(&p, "pickup RUSTY key"), "You picked up the Rusty Key");
        let room = h.interpreter.world().room(1).unwrap();
        assert!(!room.has_item("rusty key"));
        let inventory = p.inventory();
        assert_eq!(inventory.item_count(), 1);
        assert!(inventory.contains("rusty key"));
    }

    #[test]
    fn test_pickup_absent_item() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);
        let room = h.interpreter.world().room(1).unwrap();
        let before = room.item_count();

        assert_eq!(h.reply(&p, "pickup sword"), "There is no sword here");
        assert_eq!(room.item_count(), before);
        assert!(p.inventory().is_empty());
    }

    #[test]
    fn test_concurrent_pickup_single_winner() {
        let mut h = Harness::new();
        let (a, _a_rx) = h.join("ann", 3);
        let (b, _b_rx) = h.join("bob", 3);
        let barrier = std::sync::Barrier::new(2);

        let (ra, rb) = std::thread::scope(|scope| {
            let ta = scope.spawn(|| {
                barrier.wait();
                h.reply(&a, "pickup lantern")
            });
            let tb = scope.spawn(|| {
                barrier.wait();
                h.reply(&b, "pickup lantern")
            });
            (ta.join().unwrap(), tb.join().unwrap())
        });

        let wins = [&ra, &rb]
            .iter()
            .filter(|r| r.as_str() == "You picked up the Lantern")
            .count();
        assert_eq!(wins, 1);
        assert!(ra == "There is no lantern here" || rb == "There is no lantern here");
        assert_eq!(a.inventory().item_count() + b.inventory().item_count(), 1);
        assert!(!h.interpreter.world().room(3).unwrap().has_item("lantern"));
    }

    #[test]
    fn test_look_renders_room() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 3);
        h.join("sam", 3);

        assert_eq!(
            h.reply(&p, "look"),
            "You look around the room\n\
             You see 1 exit(s):\n\
             > West\n\
             You see the following items in the room:\n\
             - Lantern, It flickers weakly\n\
             You see 1 player(s):\n\
             - sam\n\
             You see the following NPCs in the room:\n\
             - Gus the merchant\n\
             - Mira"
        );
    }

    #[test]
    fn test_look_excludes_self() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 2);

        assert_eq!(
            h.reply(&p, "look"),
            "You look around the room\nYou see 1 exit(s):\n> South"
        );
    }

    #[test]
    fn test_inventory_and_help() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);

        assert_eq!(
            h.reply(&p, "inventory"),
            "You have 0 gold\nYour inventory is empty.\n"
        );
        assert_eq!(h.reply(&p, "help"), HELP_TEXT);
    }

    #[test]
    fn test_talk() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 3);

        assert_eq!(h.reply(&p, "talk gus"), "Gus says: Got anything to sell?");
        assert_eq!(h.reply(&p, "talk bob"), "There is no one called bob here.");
    }

    #[test]
    fn test_sell_flow() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 3);

        assert_eq!(h.reply(&p, "sell lantern to nobody"), MESSAGE_NO_NPC_TO_SELL);
        assert_eq!(h.reply(&p, "sell lantern to mira"), MESSAGE_NOT_MERCHANT);
        assert_eq!(h.reply(&p, "sell lantern to gus"), MESSAGE_NO_ITEM_TO_SELL);

        h.reply(&p, "pickup lantern");
        assert_eq!(
            h.reply(&p, "sell Lantern to Gus"),
            "You sold the Lantern to Gus for 12 gold."
        );
        let inventory = p.inventory();
        assert_eq!(inventory.gold(), 12);
        assert!(inventory.is_empty());

        let room = h.interpreter.world().room(3).unwrap();
        assert_eq!(room.npc("gus").unwrap().stock().len(), 1);
    }

    #[test]
    fn test_sell_uses_same_name_matching_as_pickup() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 3);
        let room = h.interpreter.world().room(3).unwrap();
        assert!(room.add_item(Item::new("Épée", "A thin blade", 30)));

        assert_eq!(h.reply(&p, "pickup ÉPÉE"), "You picked up the Épée");
        assert_eq!(
            h.reply(&p, "sell ÉPÉE to gus"),
            "You sold the Épée to Gus for 30 gold."
        );
        assert_eq!(p.inventory().gold(), 30);
    }

    #[test]
    fn test_invalid_input_is_echoed() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);

        assert_eq!(
            h.reply(&p, "dance   wildly"),
            "You can't do that: \"dance wildly\""
        );
        assert_eq!(h.run(&p, "  \n "), Response::Silent);
    }

    #[test]
    fn test_quit() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);

        assert_eq!(h.run(&p, "quit"), Response::Quit("Farewell, pat.".to_string()));
    }

    #[test]
    fn test_welcome_and_presence() {
        let mut h = Harness::new();
        let (p, _rx) = h.join("pat", 1);
        let (_q, mut q_rx) = h.join("quinn", 1);

        assert_eq!(
            h.interpreter.welcome(&p),
            "Greetings pat!\nTown Square\nA cobbled square with a dry fountain."
        );

        h.interpreter.announce_arrival(&p);
        h.interpreter.announce_departure(&p);
        let events = drain(&mut q_rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "pat has entered the world.");
        assert_eq!(events[1].kind, EventKind::PlayerDeparted);
    }
}
