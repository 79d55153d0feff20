//! Peer probe command.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use peermsg::chat::config::PROBE_WAIT;
use peermsg::chat::transport::{Binding, UdpTransport};
use peermsg::chat::{probe_peers, PeerSummary};

use super::{CommandExecutor, TransportArgs};

/// List the peers currently in a room.
///
/// Sends a `who` probe and collects the replies for a short while.
#[derive(Args, Debug)]
pub struct PeersCommand {
    /// Room to probe
    pub room: String,

    /// How long to collect replies, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = PROBE_WAIT.as_millis() as u64)]
    pub wait: u64,

    #[command(flatten)]
    pub transport: TransportArgs,
}

impl CommandExecutor for PeersCommand {
    fn execute(&self) -> Result<()> {
        let config = self.transport.to_config();

        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        let peers = rt.block_on(async {
            let transport = UdpTransport::open(&config, Binding::Listen)
                .await
                .with_context(|| format!("Failed to open {} transport", config.mode.describe()))?;

            probe_peers(transport, &self.room, Duration::from_millis(self.wait))
                .await
                .with_context(|| format!("Failed to probe \"{}\"", self.room))
        })?;

        for line in format_peers(&self.room, &peers) {
            println!("{}", line);
        }
        Ok(())
    }
}

fn format_peers(room: &str, peers: &[PeerSummary]) -> Vec<String> {
    if peers.is_empty() {
        return vec![format!("No peers in \"{}\".", room)];
    }

    let mut lines = vec![format!("Peers in \"{}\":", room)];
    lines.extend(
        peers
            .iter()
            .map(|peer| format!("• {} @ {}", peer.name, peer.address)),
    );
    lines
}
