//! One-shot send command.

use anyhow::{Context, Result};
use clap::Args;

use peermsg::chat::send_once;
use peermsg::chat::transport::{Binding, UdpTransport};

use super::{CommandExecutor, IdentityArgs, TransportArgs};

/// Send a single message to a room and exit.
///
/// Uses an ephemeral local port, so it works next to a running `join`.
#[derive(Args, Debug)]
pub struct SendCommand {
    /// Room to send to
    pub room: String,

    /// Message text
    pub message: String,

    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(flatten)]
    pub transport: TransportArgs,
}

impl CommandExecutor for SendCommand {
    fn execute(&self) -> Result<()> {
        let name = self.identity.display_name();
        let key = self.identity.chat_key()?;
        let config = self.transport.to_config();

        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(async {
            let transport = UdpTransport::open(&config, Binding::SendOnly)
                .await
                .with_context(|| format!("Failed to open {} transport", config.mode.describe()))?;

            send_once(transport, &self.room, &name, &self.message, key)
                .await
                .with_context(|| format!("Failed to send to \"{}\"", self.room))
        })
    }
}
