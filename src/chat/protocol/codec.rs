//! Envelope encoding with optional chat encryption.
//!
//! Only chat envelopes are ever encrypted. Presence traffic (hello, who)
//! always goes out in the clear so peers with different keys still see each
//! other.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::chat::config::PROTOCOL_VERSION;
use crate::chat::error::{ChatError, DecodeError};
use crate::chat::protocol::envelope::{Chat, Envelope, Sealed, CIPHER_ALG};
use crate::crypto::{decrypt_str, encrypt_str, ChatKey};

/// Encrypts a chat envelope into an `enc` wrapper.
pub fn seal_chat(chat: &Chat, key: &ChatKey) -> Result<Sealed, ChatError> {
    let inner = serde_json::to_string(&Envelope::Chat(chat.clone()))
        .map_err(|e| ChatError::SerializationFailed(e.to_string()))?;
    let parts = encrypt_str(&inner, key)?;

    Ok(Sealed {
        version: PROTOCOL_VERSION,
        alg: CIPHER_ALG.to_string(),
        nonce: BASE64.encode(parts.nonce),
        ciphertext: BASE64.encode(&parts.ciphertext),
        tag: BASE64.encode(parts.tag),
    })
}

/// Decrypts an `enc` wrapper back into the chat envelope it carries.
pub fn open_chat(sealed: &Sealed, key: &ChatKey) -> Result<Chat, DecodeError> {
    if sealed.alg != CIPHER_ALG {
        return Err(DecodeError::UnsupportedCipher(sealed.alg.clone()));
    }

    let nonce = BASE64
        .decode(&sealed.nonce)
        .map_err(|_| DecodeError::InvalidEncoding("n"))?;
    let ciphertext = BASE64
        .decode(&sealed.ciphertext)
        .map_err(|_| DecodeError::InvalidEncoding("ct"))?;
    let tag = BASE64
        .decode(&sealed.tag)
        .map_err(|_| DecodeError::InvalidEncoding("tag"))?;

    let plaintext = decrypt_str(&nonce, &ciphertext, &tag, key)?;

    // The sealed object may omit `v`; the wrapper's version then applies
    let mut inner: serde_json::Value = serde_json::from_str(&plaintext)?;
    if let Some(fields) = inner.as_object_mut() {
        fields
            .entry("v")
            .or_insert_with(|| serde_json::Value::from(sealed.version));
    }

    match Envelope::from_value(inner)? {
        Envelope::Chat(chat) => Ok(chat),
        _ => Err(DecodeError::UnexpectedInner),
    }
}

/// Encodes and decodes envelopes for one session.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec {
    key: Option<ChatKey>,
}

impl EnvelopeCodec {
    /// Create a codec; `None` means everything goes out in the clear.
    pub fn new(key: Option<ChatKey>) -> Self {
        Self { key }
    }

    /// Encode an envelope for the wire, wrapping chats when a key is set.
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ChatError> {
        match (envelope, &self.key) {
            (Envelope::Chat(chat), Some(key)) => {
                Envelope::Encrypted(seal_chat(chat, key)?).to_bytes()
            }
            _ => envelope.to_bytes(),
        }
    }

    /// Decode wire bytes, unwrapping encrypted chats.
    ///
    /// Never returns [`Envelope::Encrypted`].
    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope, DecodeError> {
        match Envelope::from_bytes(bytes)? {
            Envelope::Encrypted(sealed) => {
                let key = self.key.as_ref().ok_or(DecodeError::MissingKey)?;
                open_chat(&sealed, key).map(Envelope::Chat)
            }
            envelope => Ok(envelope),
        }
    }
}
