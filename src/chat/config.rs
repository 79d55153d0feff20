//! Chat configuration.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::ChatKey;

/// Protocol version carried in every envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Single UDP port shared by every peer and every room.
pub const PORT: u16 = 45454;

/// LAN broadcast target.
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Default multicast group (administratively scoped).
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// Default multicast TTL. 1 keeps traffic on the local network.
pub const MULTICAST_TTL: u32 = 1;

/// Presence re-announce interval.
pub const HELLO_INTERVAL: Duration = Duration::from_secs(5);

/// Stale peer sweep interval.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(2500);

/// Age after which a silent peer is evicted.
pub const PEER_TTL: Duration = Duration::from_secs(20);

/// How long `peers` collects hello replies.
pub const PROBE_WAIT: Duration = Duration::from_millis(1200);

/// Pause after a failed receive before polling the endpoint again.
pub const RECV_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Environment variable holding the chat passphrase.
pub const KEY_ENV_VAR: &str = "PEERMSG_KEY";

/// Display name used when none is configured.
pub const DEFAULT_NAME: &str = "anon";

/// How datagrams reach the other peers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportMode {
    /// Limited broadcast (255.255.255.255).
    Broadcast,

    /// IPv4 multicast group.
    Multicast {
        /// Group address to join and send to.
        group: Ipv4Addr,
        /// Local interface address to join on; any interface when `None`.
        interface: Option<Ipv4Addr>,
        /// Outbound TTL (hop count).
        ttl: u32,
    },
}

impl Default for TransportMode {
    fn default() -> Self {
        Self::Broadcast
    }
}

impl TransportMode {
    /// Multicast on the default group with the default TTL.
    pub fn multicast() -> Self {
        Self::Multicast {
            group: MULTICAST_GROUP,
            interface: None,
            ttl: MULTICAST_TTL,
        }
    }

    /// Human-readable description, e.g. `multicast(239.255.0.1, ttl=1)`.
    pub fn describe(&self) -> String {
        match self {
            Self::Broadcast => "broadcast".to_string(),
            Self::Multicast {
                group,
                interface: Some(iface),
                ttl,
            } => format!("multicast({}, ttl={}, iface={})", group, ttl, iface),
            Self::Multicast {
                group,
                interface: None,
                ttl,
            } => format!("multicast({}, ttl={})", group, ttl),
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    /// Broadcast or multicast delivery.
    pub mode: TransportMode,
    /// UDP port shared by all peers.
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            port: PORT,
        }
    }
}

impl TransportConfig {
    /// Create a config for the given mode on the well-known port.
    pub fn new(mode: TransportMode) -> Self {
        Self { mode, port: PORT }
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Presence timers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceTiming {
    /// How often we re-announce ourselves.
    pub hello_interval: Duration,
    /// How often stale peers are swept.
    pub sweep_interval: Duration,
    /// Age after which a silent peer is dropped.
    pub peer_ttl: Duration,
}

impl Default for PresenceTiming {
    fn default() -> Self {
        Self {
            hello_interval: HELLO_INTERVAL,
            sweep_interval: SWEEP_INTERVAL,
            peer_ttl: PEER_TTL,
        }
    }
}

/// Configuration for a chat session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Room name; only peers in the same room interact.
    pub room: String,
    /// Our display name.
    pub name: String,
    /// Chat key; `None` disables encryption for the whole session.
    pub key: Option<ChatKey>,
    /// Presence timers.
    pub timing: PresenceTiming,
}

impl SessionConfig {
    /// Create an unencrypted config with default timers.
    pub fn new(room: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            name: name.into(),
            key: None,
            timing: PresenceTiming::default(),
        }
    }

    /// Enable chat encryption with the given key.
    pub fn with_key(mut self, key: Option<ChatKey>) -> Self {
        self.key = key;
        self
    }

    /// Override the presence timers.
    pub fn with_timing(mut self, timing: PresenceTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Whether chat payloads are encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}
