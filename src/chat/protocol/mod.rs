//! Chat protocol types and operations.
//!
//! - **Envelopes**: hello / who / chat / enc, one JSON object per datagram
//! - **Codec**: encodes envelopes, encrypting chat payloads when keyed

mod codec;
mod envelope;

pub use codec::{open_chat, seal_chat, EnvelopeCodec};
pub use envelope::{now_millis, Chat, Envelope, Hello, Sealed, Who, CIPHER_ALG};
