//! Arguments shared by several commands.

use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use clap::Args;

use peermsg::chat::config::{DEFAULT_NAME, KEY_ENV_VAR, MULTICAST_GROUP, MULTICAST_TTL, PORT};
use peermsg::chat::{TransportConfig, TransportMode};
use peermsg::crypto::ChatKey;

/// How to reach the other peers.
#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Use multicast instead of broadcast
    #[arg(long)]
    pub mc: bool,

    /// Multicast group
    #[arg(long, value_name = "IP", default_value_t = MULTICAST_GROUP)]
    pub maddr: Ipv4Addr,

    /// Local interface address to join on (multicast only)
    #[arg(long, value_name = "LOCAL-IP")]
    pub miface: Option<Ipv4Addr>,

    /// Multicast TTL/hops
    #[arg(long, value_name = "N", default_value_t = MULTICAST_TTL)]
    pub ttl: u32,

    /// UDP port shared by every peer
    #[arg(long, default_value_t = PORT)]
    pub port: u16,
}

impl TransportArgs {
    /// Build the transport configuration. Multicast options are ignored
    /// unless `--mc` is given.
    pub fn to_config(&self) -> TransportConfig {
        let mode = if self.mc {
            TransportMode::Multicast {
                group: self.maddr,
                interface: self.miface,
                ttl: self.ttl,
            }
        } else {
            TransportMode::Broadcast
        };
        TransportConfig::new(mode).with_port(self.port)
    }
}

/// Who we are and how chat is protected.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Display name (defaults to $USER, then "anon")
    #[arg(long, env = "USER", hide_env = true)]
    pub name: Option<String>,

    /// Passphrase enabling AES-256-GCM for chat messages
    #[arg(long, value_name = "PASSPHRASE", env = KEY_ENV_VAR, hide_env_values = true)]
    pub key: Option<String>,
}

impl IdentityArgs {
    /// Display name with fallbacks applied.
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NAME)
            .to_string()
    }

    /// Derive the chat key, if a passphrase was given.
    pub fn chat_key(&self) -> Result<Option<ChatKey>> {
        ChatKey::derive_optional(self.key.as_deref()).context("Failed to derive chat key")
    }
}
