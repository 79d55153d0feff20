//! Application state for the TUI.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::chat::peers::PeerSummary;
use crate::chat::session::{ChatEvent, SessionEvent};

/// Who sent the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAuthor {
    /// Message from the local user.
    You,
    /// Message from a peer in the room.
    Peer(String),
    /// System message (status, errors, etc).
    System,
}

/// A chat message with metadata.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Who sent the message.
    pub author: MessageAuthor,
    /// The message content.
    pub content: String,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl ChatMessage {
    /// Create a message stamped with the current time.
    pub fn new(author: MessageAuthor, content: String) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            author,
            content,
            timestamp,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageAuthor::System, content.into())
    }

    /// Create a message from the local user.
    pub fn from_you(content: impl Into<String>) -> Self {
        Self::new(MessageAuthor::You, content.into())
    }

    /// Create a message from a received chat, keeping the sender's clock.
    pub fn from_event(event: &ChatEvent) -> Self {
        Self {
            author: MessageAuthor::Peer(event.from.clone()),
            content: event.text.clone(),
            timestamp: event.timestamp / 1000,
        }
    }

    /// Format the timestamp as HH:MM (UTC).
    pub fn formatted_time(&self) -> String {
        let secs = self.timestamp % 86400;
        let hours = (secs / 3600) % 24;
        let minutes = (secs % 3600) / 60;
        format!("{:02}:{:02}", hours, minutes)
    }
}

/// Default maximum message length.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 512;

/// Messages kept in the scrollback.
pub const MAX_HISTORY: usize = 300;

/// Application state for the chat TUI.
pub struct App {
    /// Room we joined.
    pub room: String,
    /// Our display name.
    pub name: String,
    /// Whether chat payloads are encrypted.
    pub encrypted: bool,
    /// Transport description for the header.
    pub transport: String,
    /// Current input text.
    pub input: String,
    /// Cursor position in the input.
    pub cursor_position: usize,
    /// Chat message history.
    pub messages: Vec<ChatMessage>,
    /// Peers currently present.
    pub peers: Vec<PeerSummary>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Scroll offset for message history (0 = bottom).
    pub scroll_offset: usize,
    /// Messages sent count.
    pub messages_sent: u32,
    /// Messages received count.
    pub messages_received: u32,
    /// Maximum message length in characters.
    pub max_message_len: usize,
}

impl App {
    /// Create a new App instance.
    pub fn new(room: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            name: name.into(),
            encrypted: false,
            transport: String::new(),
            input: String::new(),
            cursor_position: 0,
            messages: Vec::new(),
            peers: Vec::new(),
            should_quit: false,
            scroll_offset: 0,
            messages_sent: 0,
            messages_received: 0,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }

    /// Mark chat payloads as encrypted.
    pub fn with_encryption(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Set the transport description.
    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = transport.into();
        self
    }

    /// Get remaining characters available for input.
    pub fn remaining_chars(&self) -> usize {
        self.max_message_len.saturating_sub(self.input.chars().count())
    }

    /// Check if input is at max length.
    pub fn is_input_at_max(&self) -> bool {
        self.input.chars().count() >= self.max_message_len
    }

    fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > MAX_HISTORY {
            let excess = self.messages.len() - MAX_HISTORY;
            self.messages.drain(..excess);
        }
        self.scroll_to_bottom();
    }

    /// Add a system message.
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.push_message(ChatMessage::system(content));
    }

    /// Add a message from the local user.
    pub fn add_my_message(&mut self, content: impl Into<String>) {
        self.push_message(ChatMessage::from_you(content));
        self.messages_sent += 1;
    }

    /// Add a message received from the room.
    pub fn add_peer_message(&mut self, event: &ChatEvent) {
        self.push_message(ChatMessage::from_event(event));
        self.messages_received += 1;
    }

    /// Replace the peer list.
    pub fn set_peers(&mut self, peers: Vec<PeerSummary>) {
        self.peers = peers;
    }

    /// Apply an event published by the session.
    pub fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Chat(chat) => self.add_peer_message(&chat),
            SessionEvent::Peers(peers) => self.set_peers(peers),
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        let cursor_moved_left = self.cursor_position.saturating_sub(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_left);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        let cursor_moved_right = self.cursor_position.saturating_add(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_right);
    }

    /// Insert a character at cursor position (respects max length).
    pub fn enter_char(&mut self, c: char) {
        if self.is_input_at_max() {
            return;
        }
        let index = self.byte_index();
        self.input.insert(index, c);
        self.move_cursor_right();
    }

    /// Delete character before cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }

        let current_index = self.cursor_position;
        let before = self.input.chars().take(current_index - 1);
        let after = self.input.chars().skip(current_index);

        self.input = before.chain(after).collect();
        self.move_cursor_left();
    }

    /// Delete character after cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position >= self.input.chars().count() {
            return;
        }

        let current_index = self.cursor_position;
        let before = self.input.chars().take(current_index);
        let after = self.input.chars().skip(current_index + 1);

        self.input = before.chain(after).collect();
    }

    fn clamp_cursor(&self, new_cursor_pos: usize) -> usize {
        new_cursor_pos.clamp(0, self.input.chars().count())
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.cursor_position)
            .unwrap_or(self.input.len())
    }

    /// Take the current input and clear it.
    pub fn take_input(&mut self) -> String {
        self.cursor_position = 0;
        std::mem::take(&mut self.input)
    }

    /// Scroll to the bottom of messages.
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Scroll up by n lines.
    pub fn scroll_up(&mut self, n: usize) {
        let max_scroll = self.messages.len().saturating_sub(1);
        self.scroll_offset = self.scroll_offset.saturating_add(n).min(max_scroll);
    }

    /// Scroll down by n lines.
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    /// Scroll to the oldest message.
    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = self.messages.len().saturating_sub(1);
    }

    /// Move cursor to start of input.
    pub fn move_cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to end of input.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input.chars().count();
    }
}
