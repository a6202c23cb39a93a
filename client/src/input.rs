//! Local input: command parsing and action sequencing

use shared::protocol::SEQUENCE_LIMIT;
use shared::{Action, ChatKind};

/// Hands out action sequence numbers, wrapping at 2^13.
#[derive(Debug, Clone, Default)]
pub struct InputSequencer {
    next_sequence: u16,
}

impl InputSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u16 {
        let sequence = self.next_sequence;
        self.next_sequence = (self.next_sequence + 1) % SEQUENCE_LIMIT;
        sequence
    }

    pub fn peek(&self) -> u16 {
        self.next_sequence
    }
}

/// One line typed by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Act(Action),
    Say(ChatKind, String),
    Show,
    Quit,
}

impl Command {
    /// Parses `up`, `down`, `left`, `right`, `bomb`, `say <text>`,
    /// `team <text>`, `show` and `quit`. Single-letter WASD/B aliases work too.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => None,
            "say" if !rest.is_empty() => Some(Command::Say(ChatKind::Global, rest.to_string())),
            "team" if !rest.is_empty() => Some(Command::Say(ChatKind::Team, rest.to_string())),
            "show" => Some(Command::Show),
            "quit" | "q" => Some(Command::Quit),
            other if rest.is_empty() => other.parse::<Action>().ok().map(Command::Act),
            _ => None,
        }
    }
}
