use std::collections::VecDeque;

/// Maximum chat text length in bytes (the wire length field is one byte).
pub const TEXT_SIZE: usize = 255;
/// Number of history entries kept before the oldest is dropped.
pub const HISTORY_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Global,
    Team,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sender: u8,
    pub kind: ChatKind,
    pub text: String,
}

/// Chat log of one game: the line being typed plus received history.
#[derive(Debug, Clone)]
pub struct Chat {
    line: String,
    whispering: bool,
    history: VecDeque<ChatEntry>,
    capacity: usize,
}

impl Chat {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            line: String::new(),
            whispering: false,
            history: VecDeque::with_capacity(capacity.min(HISTORY_SIZE)),
            capacity: capacity.max(1),
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Appends a character unless the line would exceed [`TEXT_SIZE`] bytes.
    pub fn push_char(&mut self, c: char) -> bool {
        if self.line.len() + c.len_utf8() > TEXT_SIZE {
            return false;
        }
        self.line.push(c);
        true
    }

    pub fn erase(&mut self) -> Option<char> {
        self.line.pop()
    }

    pub fn clear_line(&mut self) {
        self.line.clear();
    }

    pub fn is_whispering(&self) -> bool {
        self.whispering
    }

    pub fn toggle_whispering(&mut self) {
        self.whispering = !self.whispering;
    }

    /// Moves the current line into the history as a message from `sender`.
    ///
    /// Whitespace-only lines are kept in place and nothing is recorded.
    pub fn submit_line(&mut self, sender: u8) -> Option<ChatEntry> {
        if self.line.trim().is_empty() {
            return None;
        }
        let kind = if self.whispering {
            ChatKind::Team
        } else {
            ChatKind::Global
        };
        let entry = ChatEntry {
            sender,
            kind,
            text: std::mem::take(&mut self.line),
        };
        self.push(entry.clone());
        Some(entry)
    }

    pub fn push(&mut self, entry: ChatEntry) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    pub fn history(&self) -> impl Iterator<Item = &ChatEntry> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}
