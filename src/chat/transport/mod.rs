//! Transport layer for chat datagrams.
//!
//! This module defines the async datagram transport trait and its
//! implementations: UDP broadcast/multicast for real networks and an
//! in-process hub for tests and local simulations.

mod memory;
mod udp;

pub use memory::{MemoryHub, MemoryTransport};
pub use udp::UdpTransport;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::chat::error::ChatError;

/// Largest datagram we accept. Envelopes are far smaller than any MTU.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// One inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Raw payload.
    pub payload: Vec<u8>,
    /// Address the datagram came from.
    pub source: SocketAddr,
}

/// How the endpoint is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Bound to the shared port; receives group traffic.
    Listen,
    /// Ephemeral local port for one-shot sends; never holds the shared port.
    SendOnly,
}

/// Trait for a datagram transport delivering to a fixed group destination.
#[async_trait]
pub trait DatagramTransport: Send {
    /// Send a payload to the configured destination. Fire-and-forget.
    async fn send(&mut self, payload: &[u8]) -> Result<(), ChatError>;

    /// Receive the next datagram, in arrival order.
    ///
    /// Must be cancel-safe: dropping the future loses no datagram.
    async fn recv(&mut self) -> Result<Datagram, ChatError>;

    /// Release the endpoint. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), ChatError>;

    /// Local address of the endpoint.
    fn local_addr(&self) -> Result<SocketAddr, ChatError>;
}
