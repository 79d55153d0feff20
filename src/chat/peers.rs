//! Peer table with TTL-based eviction.
//!
//! Presence is soft state: a record lives only as long as the peer keeps
//! announcing itself or chatting. There is no explicit leave message.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Last-seen metadata for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Display name from the latest envelope.
    pub name: String,
    /// When we last heard from the peer.
    pub last_seen: Instant,
    /// Where that envelope came from.
    pub source: SocketAddr,
}

/// Public view of a peer, as published to observers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerSummary {
    /// Display name.
    pub name: String,
    /// Source IP address.
    pub address: IpAddr,
}

/// Mapping from peer identity to last-seen metadata.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<String, PeerRecord>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a peer. Returns `true` if the peer was new.
    pub fn upsert(&mut self, id: &str, name: &str, source: SocketAddr, now: Instant) -> bool {
        let record = PeerRecord {
            name: name.to_string(),
            last_seen: now,
            source,
        };
        self.peers.insert(id.to_string(), record).is_none()
    }

    /// Remove every peer not heard from for longer than `ttl`.
    ///
    /// Returns the number of peers removed.
    pub fn sweep(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.peers.len();
        self.peers
            .retain(|_, record| now.saturating_duration_since(record.last_seen) <= ttl);
        before - self.peers.len()
    }

    /// Look up a peer by identity.
    pub fn get(&self, id: &str) -> Option<&PeerRecord> {
        self.peers.get(id)
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Sorted list of known peers.
    pub fn snapshot(&self) -> Vec<PeerSummary> {
        let mut list: Vec<PeerSummary> = self
            .peers
            .values()
            .map(|record| PeerSummary {
                name: record.name.clone(),
                address: record.source.ip(),
            })
            .collect();
        list.sort();
        list
    }
}
