//! One-shot operations that do not run a full session.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time;

use crate::chat::error::ChatError;
use crate::chat::peers::PeerSummary;
use crate::chat::protocol::{Envelope, EnvelopeCodec};
use crate::chat::transport::DatagramTransport;
use crate::crypto::ChatKey;

/// Sender identity used by [`send_once`].
pub const ONESHOT_ID: &str = "oneoff";

/// Sender identity used by [`probe_peers`].
pub const PROBE_ID: &str = "probe";

/// Send a single chat message and close the transport.
///
/// The transport should be a send-only endpoint. The message is encrypted
/// when `key` is set.
pub async fn send_once<T: DatagramTransport>(
    mut transport: T,
    room: &str,
    name: &str,
    text: &str,
    key: Option<ChatKey>,
) -> Result<(), ChatError> {
    let codec = EnvelopeCodec::new(key);
    let result = match codec.encode(&Envelope::chat(room, ONESHOT_ID, name, text)) {
        Ok(bytes) => transport.send(&bytes).await,
        Err(e) => Err(e),
    };
    transport.close().await?;

    tracing::debug!(%room, ok = result.is_ok(), "one-shot message sent");
    result
}

/// Ask the room who is there and collect hello replies for `wait`.
///
/// The transport must be listening on the shared port, since replies are
/// sent to the group. Peers are deduplicated by identity.
pub async fn probe_peers<T: DatagramTransport>(
    mut transport: T,
    room: &str,
    wait: Duration,
) -> Result<Vec<PeerSummary>, ChatError> {
    let probe = Envelope::who(room, PROBE_ID, None).to_bytes()?;
    if let Err(e) = transport.send(&probe).await {
        let _ = transport.close().await;
        return Err(e);
    }

    let mut seen: HashMap<String, PeerSummary> = HashMap::new();
    let deadline = time::sleep(wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = transport.recv() => match received {
                Ok(datagram) => {
                    // Hellos are never encrypted, so no key is needed here
                    if let Ok(Envelope::Hello(hello)) = Envelope::from_bytes(&datagram.payload) {
                        if hello.room == room && hello.peer_id != PROBE_ID {
                            seen.insert(
                                hello.peer_id,
                                PeerSummary {
                                    name: hello.name,
                                    address: datagram.source.ip(),
                                },
                            );
                        }
                    }
                }
                Err(ChatError::TransportClosed) => break,
                Err(e) => tracing::trace!(error = %e, "probe receive failed"),
            },
        }
    }
    transport.close().await?;

    let mut peers: Vec<PeerSummary> = seen.into_values().collect();
    peers.sort();
    Ok(peers)
}
