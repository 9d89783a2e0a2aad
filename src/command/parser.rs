use once_cell::sync::Lazy;
use regex::Regex;

use crate::command::Command;
use crate::error::ParseError;
use crate::game::item::MAX_ITEM_NAME_LEN;

/// Longest message `say` accepts, in characters
pub const MAX_SAY_LEN: usize = 128;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

type Matcher = fn(&str) -> Result<Command, ParseError>;

/// Tried in order; the first match wins
const MATCHERS: [Matcher; 9] = [
    parse_move,
    parse_say,
    parse_pickup,
    parse_look,
    parse_inventory,
    parse_help,
    parse_talk,
    parse_sell,
    parse_quit,
];

/// Collapse whitespace and line breaks to single spaces and trim the ends
pub fn normalize(input: &str) -> String {
    WHITESPACE.replace_all(input.trim(), " ").into_owned()
}

/// Parse one line of input into a command
pub fn parse(input: &str) -> Result<Command, ParseError> {
    let input = normalize(input);
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    MATCHERS
        .iter()
        .find_map(|matcher| matcher(&input).ok())
        .ok_or(ParseError::NoMatch)
}

/// Split normalized input into its keyword and optional remainder
fn split_keyword<'a>(input: &'a str, keyword: &'static str) -> Result<Option<&'a str>, ParseError> {
    let (first, rest) = match input.split_once(' ') {
        Some((first, rest)) => (first, Some(rest)),
        None => (input, None),
    };
    if !first.eq_ignore_ascii_case(keyword) {
        return Err(ParseError::WrongKeyword(keyword));
    }
    Ok(rest)
}

fn required_arg<'a>(input: &'a str, keyword: &'static str) -> Result<&'a str, ParseError> {
    split_keyword(input, keyword)?.ok_or(ParseError::MissingArgument(keyword))
}

fn no_arg(input: &str, keyword: &'static str) -> Result<(), ParseError> {
    match split_keyword(input, keyword)? {
        Some(_) => Err(ParseError::UnexpectedArgument(keyword)),
        None => Ok(()),
    }
}

fn check_len(arg: &str, max: usize) -> Result<(), ParseError> {
    let actual = arg.chars().count();
    if actual > max {
        return Err(ParseError::TooLong { max, actual });
    }
    Ok(())
}

fn parse_move(input: &str) -> Result<Command, ParseError> {
    let arg = required_arg(input, "move")?;
    if arg.contains(' ') {
        return Err(ParseError::InvalidDirection(arg.to_string()));
    }
    Ok(Command::Move(arg.parse()?))
}

fn parse_say(input: &str) -> Result<Command, ParseError> {
    let message = required_arg(input, "say")?;
    check_len(message, MAX_SAY_LEN)?;
    Ok(Command::Say(message.to_string()))
}

fn parse_pickup(input: &str) -> Result<Command, ParseError> {
    let item = required_arg(input, "pickup")?;
    check_len(item, MAX_ITEM_NAME_LEN)?;
    Ok(Command::Pickup(item.to_string()))
}

fn parse_look(input: &str) -> Result<Command, ParseError> {
    no_arg(input, "look").map(|_| Command::Look)
}

fn parse_inventory(input: &str) -> Result<Command, ParseError> {
    no_arg(input, "inventory").map(|_| Command::Inventory)
}

fn parse_help(input: &str) -> Result<Command, ParseError> {
    no_arg(input, "help").map(|_| Command::Help)
}

fn parse_talk(input: &str) -> Result<Command, ParseError> {
    let npc = required_arg(input, "talk")?;
    check_len(npc, MAX_ITEM_NAME_LEN)?;
    Ok(Command::Talk(npc.to_string()))
}

fn parse_sell(input: &str) -> Result<Command, ParseError> {
    let arg = required_arg(input, "sell")?;
    // Split on the last " to " so item names may contain "to"
    let lower = arg.to_ascii_lowercase();
    let split = lower
        .rfind(" to ")
        .ok_or(ParseError::MissingArgument("sell"))?;
    let item = arg[..split].trim();
    let npc = arg[split + " to ".len()..].trim();
    if item.is_empty() || npc.is_empty() {
        return Err(ParseError::MissingArgument("sell"));
    }
    check_len(item, MAX_ITEM_NAME_LEN)?;
    Ok(Command::Sell {
        item: item.to_string(),
        npc: npc.to_string(),
    })
}

fn parse_quit(input: &str) -> Result<Command, ParseError> {
    no_arg(input, "quit").map(|_| Command::Quit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Direction;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  say   hello\r\n\r\nworld \n"), "say hello world");
        assert_eq!(normalize("look\r"), "look");
        assert_eq!(normalize("\t\n "), "");
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(parse("move north"), Ok(Command::Move(Direction::North)));
        assert_eq!(parse("MOVE West"), Ok(Command::Move(Direction::West)));
        assert_eq!(parse("move\n\nsouth"), Ok(Command::Move(Direction::South)));
        assert_eq!(parse("move up"), Err(ParseError::NoMatch));
        assert_eq!(parse("move north east"), Err(ParseError::NoMatch));
        assert_eq!(parse("move"), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_move_matcher_errors() {
        assert_eq!(
            parse_move("move"),
            Err(ParseError::MissingArgument("move"))
        );
        assert_eq!(
            parse_move("move up"),
            Err(ParseError::InvalidDirection("up".to_string()))
        );
        assert_eq!(parse_move("go north"), Err(ParseError::WrongKeyword("move")));
    }

    #[test]
    fn test_parse_say_preserves_case() {
        assert_eq!(
            parse("say Hello   World"),
            Ok(Command::Say("Hello World".to_string()))
        );
        assert_eq!(
            parse("SAY hi"),
            Ok(Command::Say("hi".to_string()))
        );
    }

    #[test]
    fn test_say_length_limit() {
        let at_limit = format!("say {}", "a".repeat(MAX_SAY_LEN));
        assert!(matches!(parse(&at_limit), Ok(Command::Say(_))));

        let over = format!("say {}", "a".repeat(MAX_SAY_LEN + 1));
        assert_eq!(
            parse_say(&over),
            Err(ParseError::TooLong {
                max: MAX_SAY_LEN,
                actual: MAX_SAY_LEN + 1
            })
        );
        assert_eq!(parse(&over), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_parse_pickup() {
        assert_eq!(
            parse("pickup Rusty Key"),
            Ok(Command::Pickup("Rusty Key".to_string()))
        );
        let over = format!("pickup {}", "k".repeat(MAX_ITEM_NAME_LEN + 1));
        assert_eq!(parse(&over), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_parse_no_payload_commands() {
        assert_eq!(parse("look"), Ok(Command::Look));
        assert_eq!(parse("  LOOK  "), Ok(Command::Look));
        assert_eq!(parse("inventory"), Ok(Command::Inventory));
        assert_eq!(parse("help"), Ok(Command::Help));
        assert_eq!(parse("quit"), Ok(Command::Quit));

        assert_eq!(parse("look around"), Err(ParseError::NoMatch));
        assert_eq!(
            parse_help("help me"),
            Err(ParseError::UnexpectedArgument("help"))
        );
    }

    #[test]
    fn test_parse_talk_and_sell() {
        assert_eq!(parse("talk Gus"), Ok(Command::Talk("Gus".to_string())));
        assert_eq!(
            parse("sell rusty key to Gus"),
            Ok(Command::Sell {
                item: "rusty key".to_string(),
                npc: "Gus".to_string()
            })
        );
        assert_eq!(
            parse("sell potato tongs TO gus"),
            Ok(Command::Sell {
                item: "potato tongs".to_string(),
                npc: "gus".to_string()
            })
        );
        assert_eq!(parse("sell rusty key"), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse(" \r\n"), Err(ParseError::Empty));
        assert_eq!(parse("dance wildly"), Err(ParseError::NoMatch));
        assert_eq!(parse("movenorth"), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_command_keyword() {
        assert_eq!(Command::Look.keyword(), "look");
        assert_eq!(
            Command::Sell {
                item: "a".into(),
                npc: "b".into()
            }
            .keyword(),
            "sell"
        );
    }
}
