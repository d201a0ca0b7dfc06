//! Client-side hybrid file encryption for MediChain records.
//! - File content: AES-256-GCM under a fresh per-file key.
//! - Key transport: the file key is wrapped to the recipient's P-256 key via
//!   ephemeral ECDH, SHA-256 key derivation and AES-256-GCM.
//!
//! Both halves are stateless functions; keys are passed in explicitly and
//! nothing secret outlives a call.

mod aead;
mod kek;
pub mod keys;
pub mod seal;

use std::fmt;
use thiserror::Error;

pub use keys::{generate_key_pair, normalize_pem, RecipientPrivateKey, RecipientPublicKey};
pub use seal::{decrypt, encrypt, SealedFile, WrappedKey};

/// AES-256 key length in bytes.
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce length in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Which AEAD layer rejected its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    KeyUnwrap,
    Content,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::KeyUnwrap => f.write_str("key unwrap"),
            Stage::Content => f.write_str("content decryption"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),
    #[error("authentication failed during {0} (wrong key or tampered data)")]
    AuthenticationFailure(Stage),
    #[error("crypto backend error: {0}")]
    CryptoBackendError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
