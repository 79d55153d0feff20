//! Chat error types.

use thiserror::Error;

use crate::crypto::SymmetricError;

/// Errors that can occur during chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Opening or configuring the endpoint failed (bind conflict, multicast
    /// join failure, bad interface). Fatal for the session.
    #[error("Transport setup failed: {0}")]
    TransportSetup(String),

    /// A datagram could not be sent. The session keeps running.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Receiving from the endpoint failed.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The transport has been closed.
    #[error("Transport closed")]
    TransportClosed,

    /// The session has been stopped.
    #[error("Session stopped")]
    SessionStopped,

    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Encryption or key derivation failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] SymmetricError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reasons an inbound datagram is rejected.
///
/// These never leave the receive path: the datagram is discarded.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Not UTF-8 JSON, unknown type, or a missing required field.
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Protocol version we do not speak.
    #[error("Unsupported protocol version: expected {expected}, got {got}")]
    UnsupportedVersion {
        /// Our protocol version.
        expected: u32,
        /// Version found in the envelope.
        got: u32,
    },

    /// Encrypted envelope but no key configured.
    #[error("Encrypted envelope without a key")]
    MissingKey,

    /// Encrypted envelope with an algorithm we do not support.
    #[error("Unsupported cipher: {0}")]
    UnsupportedCipher(String),

    /// A base64 field could not be decoded.
    #[error("Invalid base64 in field {0}")]
    InvalidEncoding(&'static str),

    /// Authentication or decryption failed.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(#[from] SymmetricError),

    /// The encrypted payload did not contain a chat envelope.
    #[error("Encrypted payload is not a chat envelope")]
    UnexpectedInner,
}
