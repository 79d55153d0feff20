//! Wire envelope types for the chat protocol.
//!
//! These types define what actually gets sent over the network: one JSON
//! object per datagram, tagged by `type` and carrying the protocol version
//! in `v`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::chat::config::PROTOCOL_VERSION;
use crate::chat::error::{ChatError, DecodeError};

/// Cipher identifier carried by encrypted envelopes.
pub const CIPHER_ALG: &str = "aes-256-gcm";

/// Presence announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Protocol version.
    #[serde(rename = "v")]
    pub version: u32,
    /// Room name.
    pub room: String,
    /// Sender identity.
    #[serde(rename = "id")]
    pub peer_id: String,
    /// Sender display name.
    pub name: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: u64,
}

/// Presence probe: asks everyone in the room to re-announce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Who {
    /// Protocol version.
    #[serde(rename = "v")]
    pub version: u32,
    /// Room name.
    pub room: String,
    /// Sender identity.
    #[serde(rename = "id")]
    pub peer_id: String,
    /// Sender display name; probes from one-shot tools omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: u64,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Protocol version.
    #[serde(rename = "v")]
    pub version: u32,
    /// Room name.
    pub room: String,
    /// Sender identity.
    #[serde(rename = "id")]
    pub peer_id: String,
    /// Sender display name.
    pub name: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: u64,
    /// Message text.
    pub text: String,
}

/// Opaque wrapper around a serialized, encrypted [`Chat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    /// Protocol version.
    #[serde(rename = "v")]
    pub version: u32,
    /// Cipher identifier, always [`CIPHER_ALG`].
    pub alg: String,
    /// Base64 nonce.
    #[serde(rename = "n")]
    pub nonce: String,
    /// Base64 ciphertext.
    #[serde(rename = "ct")]
    pub ciphertext: String,
    /// Base64 authentication tag.
    pub tag: String,
}

/// One protocol message as sent over the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// Presence announcement.
    #[serde(rename = "hello")]
    Hello(Hello),
    /// Presence probe.
    #[serde(rename = "who")]
    Who(Who),
    /// Chat message in the clear.
    #[serde(rename = "chat")]
    Chat(Chat),
    /// Encrypted chat message.
    #[serde(rename = "enc")]
    Encrypted(Sealed),
}

impl Envelope {
    /// Create a hello envelope stamped with the current time.
    pub fn hello(room: &str, peer_id: &str, name: &str) -> Self {
        Self::Hello(Hello {
            version: PROTOCOL_VERSION,
            room: room.to_string(),
            peer_id: peer_id.to_string(),
            name: name.to_string(),
            timestamp: now_millis(),
        })
    }

    /// Create a who envelope stamped with the current time.
    pub fn who(room: &str, peer_id: &str, name: Option<&str>) -> Self {
        Self::Who(Who {
            version: PROTOCOL_VERSION,
            room: room.to_string(),
            peer_id: peer_id.to_string(),
            name: name.map(str::to_string),
            timestamp: now_millis(),
        })
    }

    /// Create a chat envelope stamped with the current time.
    pub fn chat(room: &str, peer_id: &str, name: &str, text: &str) -> Self {
        Self::Chat(Chat {
            version: PROTOCOL_VERSION,
            room: room.to_string(),
            peer_id: peer_id.to_string(),
            name: name.to_string(),
            timestamp: now_millis(),
            text: text.to_string(),
        })
    }

    /// Protocol version of this envelope.
    pub fn version(&self) -> u32 {
        match self {
            Self::Hello(h) => h.version,
            Self::Who(w) => w.version,
            Self::Chat(c) => c.version,
            Self::Encrypted(s) => s.version,
        }
    }

    /// Room of this envelope; encrypted wrappers have none.
    pub fn room(&self) -> Option<&str> {
        match self {
            Self::Hello(h) => Some(&h.room),
            Self::Who(w) => Some(&w.room),
            Self::Chat(c) => Some(&c.room),
            Self::Encrypted(_) => None,
        }
    }

    /// Sender identity; encrypted wrappers have none.
    pub fn peer_id(&self) -> Option<&str> {
        match self {
            Self::Hello(h) => Some(&h.peer_id),
            Self::Who(w) => Some(&w.peer_id),
            Self::Chat(c) => Some(&c.peer_id),
            Self::Encrypted(_) => None,
        }
    }

    /// Serialize to bytes for transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ChatError> {
        serde_json::to_vec(self).map_err(|e| ChatError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes, without decrypting.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::checked(serde_json::from_slice(bytes)?)
    }

    /// Deserialize an already parsed JSON value, with the same checks as
    /// [`Envelope::from_bytes`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, DecodeError> {
        Self::checked(serde_json::from_value(value)?)
    }

    fn checked(envelope: Self) -> Result<Self, DecodeError> {
        if envelope.version() != PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                expected: PROTOCOL_VERSION,
                got: envelope.version(),
            });
        }
        Ok(envelope)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chat() -> Chat {
        Chat {
            version: PROTOCOL_VERSION,
            room: "lobby".to_string(),
            peer_id: "abc-1-xyz".to_string(),
            name: "alice".to_string(),
            timestamp: 1_700_000_000_000,
            text: "hi there".to_string(),
        }
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelopes = vec![
            Envelope::hello("lobby", "abc", "alice"),
            Envelope::who("lobby", "abc", Some("alice")),
            Envelope::who("lobby", "probe", None),
            Envelope::Chat(sample_chat()),
            Envelope::Encrypted(Sealed {
                version: PROTOCOL_VERSION,
                alg: CIPHER_ALG.to_string(),
                nonce: "AAAAAAAAAAAAAAAA".to_string(),
                ciphertext: "Zm9v".to_string(),
                tag: "AAAAAAAAAAAAAAAAAAAAAA==".to_string(),
            }),
        ];

        for envelope in envelopes {
            let bytes = envelope.to_bytes().unwrap();
            let decoded = Envelope::from_bytes(&bytes).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_wire_field_names() {
        let bytes = Envelope::Chat(sample_chat()).to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["v"], 1);
        assert_eq!(value["type"], "chat");
        assert_eq!(value["room"], "lobby");
        assert_eq!(value["id"], "abc-1-xyz");
        assert_eq!(value["name"], "alice");
        assert_eq!(value["ts"], 1_700_000_000_000u64);
        assert_eq!(value["text"], "hi there");
    }

    #[test]
    fn test_probe_omits_name() {
        let bytes = Envelope::who("lobby", "probe", None).to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["type"], "who");
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_decode_foreign_hello() {
        let raw = br#"{"v":1,"type":"hello","room":"x","id":"peer-42","name":"bob","ts":12}"#;
        match Envelope::from_bytes(raw).unwrap() {
            Envelope::Hello(hello) => {
                assert_eq!(hello.room, "x");
                assert_eq!(hello.peer_id, "peer-42");
                assert_eq!(hello.name, "bob");
                assert_eq!(hello.timestamp, 12);
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_extra_fields_tolerated() {
        let raw = br#"{"v":1,"type":"who","room":"x","id":"p","ts":1,"extra":true}"#;
        assert!(Envelope::from_bytes(raw).is_ok());
    }

    #[test]
    fn test_missing_field_rejected() {
        let raw = br#"{"v":1,"type":"chat","room":"x","id":"p","name":"bob","ts":1}"#;
        assert!(matches!(
            Envelope::from_bytes(raw),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = br#"{"v":1,"type":"bye","room":"x","id":"p","ts":1}"#;
        assert!(Envelope::from_bytes(raw).is_err());
    }

    #[test]
    fn test_future_version_rejected() {
        let raw = br#"{"v":2,"type":"hello","room":"x","id":"p","name":"n","ts":1}"#;
        assert!(matches!(
            Envelope::from_bytes(raw),
            Err(DecodeError::UnsupportedVersion { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Envelope::from_bytes(b"").is_err());
        assert!(Envelope::from_bytes(b"not json").is_err());
        assert!(Envelope::from_bytes(&[0xff, 0xfe, 0x00]).is_err());
        assert!(Envelope::from_bytes(b"null").is_err());
        assert!(Envelope::from_bytes(b"[1,2,3]").is_err());
    }

    #[test]
    fn test_accessors() {
        let hello = Envelope::hello("r", "id1", "n");
        assert_eq!(hello.room(), Some("r"));
        assert_eq!(hello.peer_id(), Some("id1"));
        assert!(hello_is_recent(&hello));
    }

    fn hello_is_recent(envelope: &Envelope) -> bool {
        match envelope {
            Envelope::Hello(h) => now_millis().saturating_sub(h.timestamp) < 60_000,
            _ => false,
        }
    }
}
