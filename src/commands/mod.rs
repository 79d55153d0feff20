//! Command module - Strategy pattern for CLI commands.
//!
//! Each command is a separate module implementing the `CommandExecutor` trait.

mod args;
mod join;
mod peers;
mod send;

pub use args::{IdentityArgs, TransportArgs};
pub use join::JoinCommand;
pub use peers::PeersCommand;
pub use send::SendCommand;

use anyhow::Result;

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements
/// this trait to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self) -> Result<()>;
}
