//! Event handling for the TUI.

use std::time::Duration;

use crossterm::event::{
    self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use tokio::sync::mpsc;

use super::app::App;

/// Terminal events.
#[derive(Debug)]
pub enum Event {
    /// Terminal tick (for refreshing UI).
    Tick,
    /// Keyboard event.
    Key(KeyEvent),
    /// Terminal resize.
    Resize(u16, u16),
}

/// Event handler that reads terminal events off the async runtime.
pub struct EventHandler {
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Create a new event handler.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Get the sender for spawning the event loop.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Spawn the event reading task.
    ///
    /// crossterm polling blocks, so the reader runs on the blocking pool and
    /// exits once the receiving side is gone.
    pub fn spawn_reader(tx: mpsc::UnboundedSender<Event>, tick_rate: Duration) {
        tokio::task::spawn_blocking(move || loop {
            let event = if event::poll(tick_rate).unwrap_or(false) {
                match event::read() {
                    Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                        Event::Key(key)
                    }
                    Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                    Ok(_) => continue,
                    Err(_) => break,
                }
            } else {
                Event::Tick
            };
            if tx.send(event).is_err() {
                break;
            }
        });
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of handling a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// No action needed.
    None,
    /// Quit the application.
    Quit,
    /// Send the current input as a message.
    SendMessage,
}

/// Handle a key event and update app state.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            app.should_quit = true;
            KeyAction::Quit
        }

        KeyCode::Esc => {
            app.should_quit = true;
            KeyAction::Quit
        }

        KeyCode::Enter => {
            if app.input.trim().is_empty() {
                KeyAction::None
            } else {
                KeyAction::SendMessage
            }
        }

        KeyCode::Backspace => {
            app.delete_char();
            KeyAction::None
        }
        KeyCode::Delete => {
            app.delete_char_forward();
            KeyAction::None
        }

        KeyCode::Left => {
            app.move_cursor_left();
            KeyAction::None
        }
        KeyCode::Right => {
            app.move_cursor_right();
            KeyAction::None
        }

        // Home/End move the cursor; with Ctrl they jump through history
        KeyCode::Home if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_to_top();
            KeyAction::None
        }
        KeyCode::End if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_to_bottom();
            KeyAction::None
        }
        KeyCode::Home => {
            app.move_cursor_home();
            KeyAction::None
        }
        KeyCode::End => {
            app.move_cursor_end();
            KeyAction::None
        }

        KeyCode::Up => {
            app.scroll_up(1);
            KeyAction::None
        }
        KeyCode::Down => {
            app.scroll_down(1);
            KeyAction::None
        }
        KeyCode::PageUp => {
            app.scroll_up(10);
            KeyAction::None
        }
        KeyCode::PageDown => {
            app.scroll_down(10);
            KeyAction::None
        }

        KeyCode::Char(c) => {
            app.enter_char(c);
            KeyAction::None
        }

        _ => KeyAction::None,
    }
}

/// Handle special commands starting with /.
pub fn handle_command(app: &mut App, command: &str) -> KeyAction {
    let parts: Vec<&str> = command.split_whitespace().collect();
    if parts.is_empty() {
        return KeyAction::None;
    }

    match parts[0] {
        "/quit" | "/q" | "/exit" => {
            app.should_quit = true;
            KeyAction::Quit
        }
        "/help" | "/h" | "/?" => {
            app.add_system_message("Commands:");
            app.add_system_message("  /peers, /p   - List peers in the room");
            app.add_system_message("  /clear, /c   - Clear message history");
            app.add_system_message("  /quit, /q    - Leave the room");
            app.add_system_message("  /help, /h    - Show this help");
            app.add_system_message("Keys: Up/Down/PgUp/PgDn scroll, Esc or Ctrl+C quit");
            KeyAction::None
        }
        "/peers" | "/p" => {
            if app.peers.is_empty() {
                app.add_system_message(format!("No peers in \"{}\".", app.room));
            } else {
                let lines: Vec<String> = app
                    .peers
                    .iter()
                    .map(|p| format!("  {} @ {}", p.name, p.address))
                    .collect();
                app.add_system_message(format!("Peers in \"{}\":", app.room));
                for line in lines {
                    app.add_system_message(line);
                }
            }
            KeyAction::None
        }
        "/clear" | "/c" => {
            app.messages.clear();
            app.scroll_to_bottom();
            KeyAction::None
        }
        _ => {
            app.add_system_message(format!("Unknown command: {}", parts[0]));
            app.add_system_message("Type /help for available commands");
            KeyAction::None
        }
    }
}
