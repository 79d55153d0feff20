//! Terminal user interface for a chat session.
//!
//! Messages on the left, peers on the right, input at the bottom.

mod app;
pub mod event;
mod ui;

pub use app::{App, ChatMessage, MessageAuthor, DEFAULT_MAX_MESSAGE_LEN, MAX_HISTORY};
pub use event::{handle_command, handle_key_event, Event, EventHandler, KeyAction};
pub use ui::render;

use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::chat::error::ChatError;

/// Terminal type used by the chat UI.
pub type ChatTerminal = Terminal<CrosstermBackend<io::Stdout>>;

/// Initialize the terminal for TUI mode.
pub fn init_terminal() -> Result<ChatTerminal, ChatError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e.into());
    }
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

/// Restore the terminal to normal mode.
pub fn restore_terminal(terminal: &mut ChatTerminal) -> Result<(), ChatError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
