//! Join command: stay in a room and chat.
//!
//! Two front ends share one session: a plain line mode (stdin in, stdout
//! out) and the full-screen terminal UI.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use peermsg::chat::tui::{
    handle_command, handle_key_event, init_terminal, render, restore_terminal, App, ChatTerminal,
    Event, EventHandler, KeyAction,
};
use peermsg::chat::{Session, SessionConfig, SessionEvent, SessionEvents, TransportConfig};

use super::{CommandExecutor, IdentityArgs, TransportArgs};

/// Join a room and chat until interrupted.
#[derive(Args, Debug)]
pub struct JoinCommand {
    /// Room to join
    pub room: String,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Full-screen terminal UI
    #[arg(long)]
    pub tui: bool,

    #[command(flatten)]
    pub transport: TransportArgs,
}

impl CommandExecutor for JoinCommand {
    fn execute(&self) -> Result<()> {
        if self.tui && !(std::io::stdin().is_terminal() && std::io::stdout().is_terminal()) {
            bail!("TUI requires an interactive terminal. Try without --tui.");
        }

        let name = self.identity.display_name();
        let key = self.identity.chat_key()?;
        let transport = self.transport.to_config();

        if key.is_some() {
            println!("peermsg: encryption ON (AES-256-GCM).");
        }
        println!("peermsg: transport = {}", transport.mode.describe());

        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(async {
            let config = SessionConfig::new(&self.room, name).with_key(key);
            let (session, events) = Session::join(config, &transport)
                .await
                .with_context(|| format!("Failed to join \"{}\"", self.room))?;

            let result = if self.tui {
                run_tui(&session, events, &transport).await
            } else {
                run_line_mode(&session, events).await
            };

            session.stop().await;
            result
        })
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Peer-supplied text with control characters dropped, so it cannot drive
/// the terminal.
fn printable(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

async fn run_line_mode(session: &Session, mut events: SessionEvents) -> Result<()> {
    let room = session.room();
    println!(
        "peermsg: joined \"{}\" as \"{}\". Type to chat, Ctrl+C to exit.",
        room,
        session.name()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        let text = line.trim();
                        if !text.is_empty() {
                            match session.send(text).await {
                                Ok(()) => println!("[me@{}] {}", room, text),
                                Err(e) => eprintln!("peermsg: send failed: {}", e),
                            }
                        }
                    }
                    // Keep listening after EOF until interrupted
                    None => stdin_open = false,
                }
            }

            event = events.recv() => match event {
                Some(SessionEvent::Chat(chat)) => {
                    println!("[{}@{}] {}", printable(&chat.from), room, printable(&chat.text));
                }
                Some(SessionEvent::Peers(peers)) => {
                    tracing::info!(count = peers.len(), "peer list changed");
                }
                None => break,
            },
        }
    }

    println!("\npeermsg: bye.");
    Ok(())
}

async fn run_tui(
    session: &Session,
    events: SessionEvents,
    transport: &TransportConfig,
) -> Result<()> {
    let mut terminal = init_terminal().context("Failed to initialize terminal")?;

    let mut app = App::new(session.room(), session.name())
        .with_encryption(session.is_encrypted())
        .with_transport(transport.mode.describe());
    app.add_system_message(format!("Joined \"{}\" as \"{}\"", session.room(), session.name()));
    app.add_system_message("Type /help for commands. Esc or Ctrl+C to quit.");

    let mut input = EventHandler::new();
    EventHandler::spawn_reader(input.sender(), Duration::from_millis(100));

    let result = run_tui_loop(&mut terminal, &mut app, &mut input, session, events).await;

    restore_terminal(&mut terminal).context("Failed to restore terminal")?;
    result
}

async fn run_tui_loop(
    terminal: &mut ChatTerminal,
    app: &mut App,
    input: &mut EventHandler,
    session: &Session,
    mut events: SessionEvents,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        tokio::select! {
            event = input.next() => match event {
                Some(Event::Key(key)) => match handle_key_event(app, key) {
                    KeyAction::Quit => return Ok(()),
                    KeyAction::SendMessage => {
                        let line = app.take_input();
                        let text = line.trim();
                        if text.starts_with('/') {
                            if handle_command(app, text) == KeyAction::Quit {
                                return Ok(());
                            }
                        } else {
                            match session.send(text).await {
                                Ok(()) => app.add_my_message(text),
                                Err(e) => app.add_system_message(format!("Send failed: {}", e)),
                            }
                        }
                    }
                    KeyAction::None => {}
                },
                // Redrawn at the top of the loop
                Some(Event::Resize(_, _)) | Some(Event::Tick) => {}
                None => return Ok(()),
            },

            event = events.recv() => match event {
                Some(event) => app.apply_event(event),
                None => return Ok(()),
            },
        }
    }
}
