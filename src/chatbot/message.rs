//! Chat transcript entries and their terminal rendering.

use chrono::Local;

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Santa,
}

impl Sender {
    pub fn avatar(self) -> &'static str {
        match self {
            Sender::User => "🧑",
            Sender::Santa => "🎅",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Santa => "Santa",
        }
    }
}

/// One rendered line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Sender,
    /// Local time, "HH:MM".
    pub timestamp: String,
    pub text: String,
}

impl ChatMessage {
    /// A message stamped with the current local time.
    pub fn now(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            timestamp: Local::now().format("%H:%M").to_string(),
            text: text.into(),
        }
    }

    /// Format for the terminal.
    ///
    /// Example output:
    /// ```text
    /// 🎅 Santa [10:31]: Ho ho ho!
    /// ```
    pub fn format(&self) -> String {
        format!(
            "{} {} [{}]: {}",
            self.sender.avatar(),
            self.sender.display_name(),
            self.timestamp,
            self.text
        )
    }
}

/// Safely truncate a string at a char boundary.
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
