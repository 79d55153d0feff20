//! Symmetric encryption with a shared passphrase.
//!
//! This module provides passphrase-based symmetric encryption using:
//! - scrypt for key derivation from the passphrase
//! - AES-256-GCM for authenticated encryption
//!
//! The nonce, ciphertext and authentication tag are kept apart so they can be
//! carried as separate fields of an encrypted envelope.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Domain-separation salt for scrypt.
const KDF_SALT: &[u8] = b"peermsg-v1";

/// scrypt cost parameter (log2 of N).
const KDF_LOG_N: u8 = 14;

/// scrypt block size.
const KDF_R: u32 = 8;

/// scrypt parallelism.
const KDF_P: u32 = 1;

/// Key size for AES-256.
pub const KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-GCM (128 bits).
pub const TAG_SIZE: usize = 16;

/// Errors that can occur during symmetric encryption.
#[derive(Error, Debug)]
pub enum SymmetricError {
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid nonce length: expected {expected}, got {got}")]
    InvalidNonce { expected: usize, got: usize },

    #[error("Invalid tag length: expected {expected}, got {got}")]
    InvalidTag { expected: usize, got: usize },

    #[error("Plaintext is not valid UTF-8")]
    InvalidUtf8,
}

/// A 256-bit chat key derived from a passphrase.
///
/// The key material is wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ChatKey([u8; KEY_SIZE]);

impl ChatKey {
    /// Derive a key from a passphrase with scrypt.
    pub fn derive(passphrase: &str) -> Result<Self, SymmetricError> {
        let params = scrypt::Params::new(KDF_LOG_N, KDF_R, KDF_P, KEY_SIZE)
            .map_err(|e| SymmetricError::KeyDerivationFailed(e.to_string()))?;
        let mut key = [0u8; KEY_SIZE];
        scrypt::scrypt(passphrase.as_bytes(), KDF_SALT, &params, &mut key)
            .map_err(|e| SymmetricError::KeyDerivationFailed(e.to_string()))?;
        Ok(Self(key))
    }

    /// Derive a key only when a non-empty passphrase is given.
    ///
    /// No passphrase means the whole session runs unencrypted.
    pub fn derive_optional(passphrase: Option<&str>) -> Result<Option<Self>, SymmetricError> {
        match passphrase {
            Some(p) if !p.is_empty() => Self::derive(p).map(Some),
            _ => Ok(None),
        }
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for ChatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChatKey(<redacted>)")
    }
}

/// The three pieces of an AES-GCM encryption result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedParts {
    /// Random 96-bit nonce.
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext without the tag.
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_SIZE],
}

/// Encrypts a UTF-8 string with AES-256-GCM under a fresh random nonce.
pub fn encrypt_str(plaintext: &str, key: &ChatKey) -> Result<SealedParts, SymmetricError> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| SymmetricError::EncryptionFailed)?;

    // aes-gcm appends the tag to the ciphertext
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| SymmetricError::EncryptionFailed)?;
    let split = sealed.len() - TAG_SIZE;
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&sealed[split..]);
    sealed.truncate(split);

    Ok(SealedParts {
        nonce,
        ciphertext: sealed,
        tag,
    })
}

/// Decrypts raw nonce/ciphertext/tag bytes back into a UTF-8 string.
///
/// Any failure (length, tag mismatch, wrong key, bad UTF-8) is an error; a
/// wrong plaintext is never returned.
pub fn decrypt_str(
    nonce: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    key: &ChatKey,
) -> Result<String, SymmetricError> {
    if nonce.len() != NONCE_SIZE {
        return Err(SymmetricError::InvalidNonce {
            expected: NONCE_SIZE,
            got: nonce.len(),
        });
    }
    if tag.len() != TAG_SIZE {
        return Err(SymmetricError::InvalidTag {
            expected: TAG_SIZE,
            got: tag.len(),
        });
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| SymmetricError::DecryptionFailed)?;

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
        .map_err(|_| SymmetricError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| SymmetricError::InvalidUtf8)
}
