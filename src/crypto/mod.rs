//! Cryptographic operations for peermsg.
//!
//! Chat payloads are sealed with AES-256-GCM under a key derived from a
//! shared passphrase (scrypt). Presence traffic is never encrypted.

pub mod symmetric;

pub use symmetric::{decrypt_str, encrypt_str, ChatKey, SealedParts, SymmetricError};
