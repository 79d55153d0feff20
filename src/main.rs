//! peermsg - serverless LAN chat
//!
//! Peers in the same room find each other over UDP broadcast or multicast
//! and chat without any server.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::{CommandExecutor, JoinCommand, PeersCommand, SendCommand};

/// peermsg - local peer-to-peer messenger (LAN/Wi-Fi)
///
/// Chat payloads are encrypted with AES-256-GCM when a passphrase is given
/// with --key or PEERMSG_KEY. Presence traffic is always in the clear.
#[derive(Parser)]
#[command(name = "peermsg")]
#[command(version = peermsg::VERSION)]
#[command(about = "Serverless LAN chat over UDP broadcast or multicast")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room and chat
    Join(JoinCommand),

    /// Send a single message to a room
    Send(SendCommand),

    /// List the peers in a room
    Peers(PeersCommand),
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn init_logging(level: LevelFilter) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(level)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log lines would tear the full-screen UI
    let level = match &cli.command {
        Commands::Join(join) if join.tui => LevelFilter::OFF,
        _ => log_level(cli.verbose),
    };
    init_logging(level);

    match &cli.command {
        Commands::Join(cmd) => cmd.execute(),
        Commands::Send(cmd) => cmd.execute(),
        Commands::Peers(cmd) => cmd.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_join() {
        let cli = Cli::try_parse_from([
            "peermsg", "join", "lobby", "--name", "alice", "--tui", "--mc", "--ttl", "2", "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Join(join) => {
                assert_eq!(join.room, "lobby");
                assert_eq!(join.identity.display_name(), "alice");
                assert!(join.tui);
                assert!(join.transport.mc);
                assert_eq!(join.transport.ttl, 2);
            }
            _ => panic!("expected join"),
        }
    }

    #[test]
    fn test_parse_send_and_peers() {
        let cli = Cli::try_parse_from(["peermsg", "send", "lobby", "hello there"]).unwrap();
        match cli.command {
            Commands::Send(send) => {
                assert_eq!(send.room, "lobby");
                assert_eq!(send.message, "hello there");
                assert!(!send.transport.mc);
            }
            _ => panic!("expected send"),
        }

        let cli = Cli::try_parse_from(["peermsg", "peers", "lobby", "--wait", "500"]).unwrap();
        match cli.command {
            Commands::Peers(peers) => assert_eq!(peers.wait, 500),
            _ => panic!("expected peers"),
        }
    }

    #[test]
    fn test_bad_multicast_address_rejected() {
        assert!(Cli::try_parse_from(["peermsg", "join", "x", "--maddr", "nope"]).is_err());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(log_level(0), LevelFilter::WARN);
        assert_eq!(log_level(3), LevelFilter::TRACE);
        assert_eq!(log_level(9), LevelFilter::TRACE);
    }
}
