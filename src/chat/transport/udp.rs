//! UDP transport for chat datagrams.
//!
//! Broadcast endpoints send to `255.255.255.255:<port>`; multicast endpoints
//! join the configured group and send to `<group>:<port>`. Sockets are built
//! with socket2 so address/port reuse and multicast options can be set
//! before binding, then handed to tokio.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::chat::config::{TransportConfig, TransportMode, BROADCAST_ADDR};
use crate::chat::error::ChatError;
use crate::chat::transport::{Binding, Datagram, DatagramTransport, MAX_DATAGRAM_SIZE};

/// UDP endpoint bound for broadcast or multicast delivery.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    destination: SocketAddr,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Open an endpoint for the given configuration.
    ///
    /// Any failure here (bind conflict, multicast join, bad interface) is a
    /// setup error and the endpoint is not usable.
    pub async fn open(config: &TransportConfig, binding: Binding) -> Result<Self, ChatError> {
        let socket = build_socket(config, binding)?;
        let socket = UdpSocket::from_std(socket.into()).map_err(setup_error("register socket"))?;

        tracing::debug!(
            mode = %config.mode.describe(),
            ?binding,
            local = ?socket.local_addr().ok(),
            "transport open"
        );

        Ok(Self {
            socket: Some(socket),
            destination: destination(config),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    /// Address every send goes to.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn socket(&self) -> Result<&UdpSocket, ChatError> {
        self.socket.as_ref().ok_or(ChatError::TransportClosed)
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), ChatError> {
        let destination = self.destination;
        self.socket()?
            .send_to(payload, destination)
            .await
            .map_err(|e| ChatError::SendFailed(format!("{}: {}", destination, e)))?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Datagram, ChatError> {
        let socket = self.socket.as_ref().ok_or(ChatError::TransportClosed)?;
        let (len, source) = socket
            .recv_from(&mut self.buf)
            .await
            .map_err(|e| ChatError::ReceiveFailed(e.to_string()))?;
        Ok(Datagram {
            payload: self.buf[..len].to_vec(),
            source,
        })
    }

    async fn close(&mut self) -> Result<(), ChatError> {
        if self.socket.take().is_some() {
            tracing::debug!(destination = %self.destination, "transport closed");
        }
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.socket()?.local_addr()?)
    }
}

fn destination(config: &TransportConfig) -> SocketAddr {
    match config.mode {
        TransportMode::Broadcast => SocketAddr::from((BROADCAST_ADDR, config.port)),
        TransportMode::Multicast { group, .. } => SocketAddr::from((group, config.port)),
    }
}

fn setup_error(what: &'static str) -> impl Fn(io::Error) -> ChatError {
    move |e| ChatError::TransportSetup(format!("{}: {}", what, e))
}

fn build_socket(config: &TransportConfig, binding: Binding) -> Result<Socket, ChatError> {
    if let TransportMode::Multicast { group, .. } = config.mode {
        if !group.is_multicast() {
            return Err(ChatError::TransportSetup(format!(
                "{} is not a multicast address",
                group
            )));
        }
    }

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(setup_error("create socket"))?;

    // Every peer on the host shares the well-known port
    let port = match binding {
        Binding::Listen => {
            socket
                .set_reuse_address(true)
                .map_err(setup_error("enable address reuse"))?;
            #[cfg(unix)]
            socket
                .set_reuse_port(true)
                .map_err(setup_error("enable port reuse"))?;
            config.port
        }
        Binding::SendOnly => 0,
    };

    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket
        .bind(&bind_addr.into())
        .map_err(|e| ChatError::TransportSetup(format!("bind {}: {}", bind_addr, e)))?;

    match config.mode {
        TransportMode::Broadcast => {
            socket
                .set_broadcast(true)
                .map_err(setup_error("enable broadcast"))?;
        }
        TransportMode::Multicast {
            group,
            interface,
            ttl,
        } => {
            socket
                .set_multicast_ttl_v4(ttl)
                .map_err(setup_error("set multicast ttl"))?;
            if let Some(iface) = interface {
                socket
                    .set_multicast_if_v4(&iface)
                    .map_err(|e| ChatError::TransportSetup(format!("interface {}: {}", iface, e)))?;
            }
            match binding {
                Binding::Listen => {
                    let iface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
                    socket.join_multicast_v4(&group, &iface).map_err(|e| {
                        ChatError::TransportSetup(format!("join {} on {}: {}", group, iface, e))
                    })?;
                    socket
                        .set_multicast_loop_v4(true)
                        .map_err(setup_error("enable multicast loopback"))?;
                }
                Binding::SendOnly => {
                    socket
                        .set_multicast_loop_v4(false)
                        .map_err(setup_error("disable multicast loopback"))?;
                }
            }
        }
    }

    socket
        .set_nonblocking(true)
        .map_err(setup_error("set non-blocking"))?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::config::PORT;

    #[test]
    fn test_broadcast_destination() {
        let config = TransportConfig::default();
        assert_eq!(
            destination(&config),
            SocketAddr::from((Ipv4Addr::BROADCAST, PORT))
        );
    }

    #[test]
    fn test_multicast_destination() {
        let config = TransportConfig::new(TransportMode::multicast()).with_port(5000);
        assert_eq!(
            destination(&config),
            SocketAddr::from((Ipv4Addr::new(239, 255, 0, 1), 5000))
        );
    }

    #[tokio::test]
    async fn test_open_and_close_is_idempotent() {
        let config = TransportConfig::default().with_port(0);
        let mut transport = UdpTransport::open(&config, Binding::Listen).await.unwrap();
        assert!(transport.local_addr().is_ok());

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_io() {
        let config = TransportConfig::default();
        let mut transport = UdpTransport::open(&config, Binding::SendOnly).await.unwrap();
        transport.close().await.unwrap();

        assert!(matches!(
            transport.send(b"x").await,
            Err(ChatError::TransportClosed)
        ));
        assert!(matches!(
            transport.recv().await,
            Err(ChatError::TransportClosed)
        ));
        assert!(matches!(
            transport.local_addr(),
            Err(ChatError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_only_uses_ephemeral_port() {
        let config = TransportConfig::default();
        let transport = UdpTransport::open(&config, Binding::SendOnly).await.unwrap();

        assert_ne!(transport.local_addr().unwrap().port(), PORT);
        assert_eq!(transport.destination(), destination(&config));
    }

    #[tokio::test]
    async fn test_non_multicast_group_rejected() {
        let config = TransportConfig::new(TransportMode::Multicast {
            group: Ipv4Addr::new(10, 0, 0, 1),
            interface: None,
            ttl: 1,
        });
        let result = UdpTransport::open(&config, Binding::Listen).await;

        assert!(matches!(result, Err(ChatError::TransportSetup(_))));
    }
}
