//! AES-256-GCM under a caller-visible 12-byte nonce.
//!
//! Unlike a framed session cipher, the nonce is not prepended to the
//! ciphertext: the bundle carries it as its own field so the transport
//! layer can ship it next to the ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result, Stage, KEY_SIZE, NONCE_SIZE};

/// A 256-bit AES-GCM key. Serves both as the per-file content key and as
/// the key-encryption key derived from ECDH. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Fresh random key from the OS RNG.
    pub(crate) fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Import a raw key recovered from an unwrap.
    pub(crate) fn from_slice(raw: &[u8]) -> Result<Self> {
        if raw.len() != KEY_SIZE {
            return Err(Error::InvalidKeyFormat(format!(
                "content key must be {KEY_SIZE} bytes, got {}",
                raw.len()
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(raw);
        Ok(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Encrypt `plaintext`; output is ciphertext with the 16-byte tag appended.
    pub(crate) fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(&self.bytes.into());
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| Error::CryptoBackendError("AES-256-GCM encryption failed".into()))
    }

    /// Decrypt and verify. A tag mismatch is reported against `stage`.
    pub(crate) fn open(
        &self,
        nonce: &[u8; NONCE_SIZE],
        ciphertext: &[u8],
        stage: Stage,
    ) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(&self.bytes.into());
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::AuthenticationFailure(stage))
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Fresh random 96-bit nonce.
pub(crate) fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
