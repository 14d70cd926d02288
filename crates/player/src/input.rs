//! Line-oriented input layer for the headless client.
//!
//! ```text
//! /go <x> <y>       walk to a cell
//! /dir <dx> <dy>    steer manually (each -1, 0 or 1)
//! /stop             same as /dir 0 0
//! /talk <entity>    request a conversation
//! /accept <request> /reject <request>
//! /end              leave the current conversation
//! /respawn          /who   /quit
//! anything else     chat
//! ```

use std::str::FromStr;

use gridtalk_domain::{Direction, DomainError, EntityId, GridPos, RequestId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    MoveTo(GridPos),
    Steer(Direction),
    Talk(EntityId),
    Accept(RequestId),
    Reject(RequestId),
    End,
    Respawn,
    Who,
    Quit,
    Say(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Unknown command /{0}")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl InputCommand {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, InputError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(InputCommand::Say(line.to_string())));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        let command = match (name.as_str(), args.as_slice()) {
            ("go", [x, y]) => InputCommand::MoveTo(GridPos::new(
                number(x, "/go <x> <y>")?,
                number(y, "/go <x> <y>")?,
            )),
            ("go", _) => return Err(InputError::Usage("/go <x> <y>")),
            ("dir", [dx, dy]) => InputCommand::Steer(Direction::new(
                number(dx, "/dir <dx> <dy>")?,
                number(dy, "/dir <dx> <dy>")?,
            )?),
            ("dir", _) => return Err(InputError::Usage("/dir <dx> <dy>")),
            ("stop", []) => InputCommand::Steer(Direction::STOP),
            ("talk", [target]) => InputCommand::Talk(EntityId::new(*target)),
            ("talk", _) => return Err(InputError::Usage("/talk <entity>")),
            ("accept", [request]) => InputCommand::Accept(RequestId::new(*request)),
            ("accept", _) => return Err(InputError::Usage("/accept <request>")),
            ("reject", [request]) => InputCommand::Reject(RequestId::new(*request)),
            ("reject", _) => return Err(InputError::Usage("/reject <request>")),
            ("end", []) => InputCommand::End,
            ("respawn", []) => InputCommand::Respawn,
            ("who", []) => InputCommand::Who,
            ("quit" | "exit", []) => InputCommand::Quit,
            (other, _) => return Err(InputError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn number<T: FromStr>(raw: &str, usage: &'static str) -> Result<T, InputError> {
    raw.parse().map_err(|_| InputError::Usage(usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            InputCommand::parse("  hello there "),
            Ok(Some(InputCommand::Say("hello there".into())))
        );
        assert_eq!(InputCommand::parse("   "), Ok(None));
    }

    #[test]
    fn parses_movement() {
        assert_eq!(
            InputCommand::parse("/go 3 -4"),
            Ok(Some(InputCommand::MoveTo(GridPos::new(3, -4))))
        );
        assert_eq!(
            InputCommand::parse("/DIR -1 0"),
            Ok(Some(InputCommand::Steer(Direction::new(-1, 0).expect("dir"))))
        );
        assert_eq!(
            InputCommand::parse("/stop"),
            Ok(Some(InputCommand::Steer(Direction::STOP)))
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(
            InputCommand::parse("/go 3"),
            Err(InputError::Usage("/go <x> <y>"))
        );
        assert_eq!(
            InputCommand::parse("/dir 2 0"),
            Err(InputError::Domain(DomainError::InvalidDirection { dx: 2, dy: 0 }))
        );
        assert_eq!(
            InputCommand::parse("/dance"),
            Err(InputError::UnknownCommand("dance".into()))
        );
    }

    #[test]
    fn parses_conversation_commands() {
        assert_eq!(
            InputCommand::parse("/talk robot-7"),
            Ok(Some(InputCommand::Talk(EntityId::new("robot-7"))))
        );
        assert_eq!(
            InputCommand::parse("/accept r1"),
            Ok(Some(InputCommand::Accept(RequestId::new("r1"))))
        );
        assert_eq!(InputCommand::parse("/end"), Ok(Some(InputCommand::End)));
        assert_eq!(InputCommand::parse("/quit"), Ok(Some(InputCommand::Quit)));
    }
}
