//! In-process datagram hub.
//!
//! Behaves like a LAN segment with multicast loopback: every datagram sent
//! by any endpoint is delivered to every open endpoint, the sender included.
//! Used for tests and local simulations where real sockets are unwanted.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chat::config::PORT;
use crate::chat::error::ChatError;
use crate::chat::transport::{Datagram, DatagramTransport};

#[derive(Default)]
struct HubState {
    next_host: u32,
    endpoints: Vec<(SocketAddr, mpsc::UnboundedSender<Datagram>)>,
}

impl HubState {
    fn deliver(&mut self, payload: &[u8], source: SocketAddr) {
        self.endpoints.retain(|(_, tx)| {
            tx.send(Datagram {
                payload: payload.to_vec(),
                source,
            })
            .is_ok()
        });
    }
}

/// Shared in-process medium.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint with its own synthetic address.
    pub fn endpoint(&self) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        state.next_host += 1;
        let host = state.next_host;
        let addr = SocketAddr::from((
            Ipv4Addr::new(10, 0, (host >> 8) as u8, (host & 0xff) as u8),
            PORT,
        ));
        state.endpoints.push((addr, tx));

        MemoryTransport {
            state: self.state.clone(),
            addr,
            rx,
            closed: false,
        }
    }

    /// Deliver a raw payload to every endpoint as if `source` had sent it.
    pub fn inject(&self, payload: &[u8], source: SocketAddr) {
        lock(&self.state).deliver(payload, source);
    }

    /// Number of open endpoints.
    pub fn endpoint_count(&self) -> usize {
        lock(&self.state).endpoints.len()
    }
}

fn lock(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One endpoint on a [`MemoryHub`].
pub struct MemoryTransport {
    state: Arc<Mutex<HubState>>,
    addr: SocketAddr,
    rx: mpsc::UnboundedReceiver<Datagram>,
    closed: bool,
}

#[async_trait]
impl DatagramTransport for MemoryTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), ChatError> {
        if self.closed {
            return Err(ChatError::TransportClosed);
        }
        lock(&self.state).deliver(payload, self.addr);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Datagram, ChatError> {
        if self.closed {
            return Err(ChatError::TransportClosed);
        }
        self.rx.recv().await.ok_or(ChatError::TransportClosed)
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        if !self.closed {
            self.closed = true;
            let addr = self.addr;
            lock(&self.state).endpoints.retain(|(a, _)| *a != addr);
            self.rx.close();
        }
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        if self.closed {
            return Err(ChatError::TransportClosed);
        }
        Ok(self.addr)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let addr = self.addr;
        lock(&self.state).endpoints.retain(|(a, _)| *a != addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_includes_sender() {
        let hub = MemoryHub::new();
        let mut a = hub.endpoint();
        let mut b = hub.endpoint();

        a.send(b"ping").await.unwrap();

        let at_a = a.recv().await.unwrap();
        let at_b = b.recv().await.unwrap();
        assert_eq!(at_a.payload, b"ping");
        assert_eq!(at_b.payload, b"ping");
        assert_eq!(at_b.source, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_distinct_addresses() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();

        assert_ne!(a.local_addr().unwrap(), b.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_arrival_order_preserved() {
        let hub = MemoryHub::new();
        let mut a = hub.endpoint();
        let mut b = hub.endpoint();

        for i in 0..5u8 {
            a.send(&[i]).await.unwrap();
        }
        for i in 0..5u8 {
            assert_eq!(b.recv().await.unwrap().payload, vec![i]);
        }
    }

    #[tokio::test]
    async fn test_close_detaches_endpoint() {
        let hub = MemoryHub::new();
        let mut a = hub.endpoint();
        let _b = hub.endpoint();
        assert_eq!(hub.endpoint_count(), 2);

        a.close().await.unwrap();
        a.close().await.unwrap();
        assert_eq!(hub.endpoint_count(), 1);
        assert!(matches!(a.send(b"x").await, Err(ChatError::TransportClosed)));
        assert!(matches!(a.recv().await, Err(ChatError::TransportClosed)));
    }

    #[tokio::test]
    async fn test_drop_detaches_endpoint() {
        let hub = MemoryHub::new();
        {
            let _a = hub.endpoint();
            assert_eq!(hub.endpoint_count(), 1);
        }
        assert_eq!(hub.endpoint_count(), 0);
    }

    #[tokio::test]
    async fn test_inject_raw_payload() {
        let hub = MemoryHub::new();
        let mut a = hub.endpoint();
        let source = SocketAddr::from(([192, 168, 1, 9], PORT));

        hub.inject(b"garbage", source);
        let datagram = a.recv().await.unwrap();
        assert_eq!(datagram.payload, b"garbage");
        assert_eq!(datagram.source, source);
    }
}
