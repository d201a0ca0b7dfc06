//! Key-encryption key derivation: SHA-256 over the P-256 ECDH x-coordinate.
//!
//! This is the same pipeline the browser client runs through WebCrypto
//! (`deriveBits` of 256 bits, then `digest("SHA-256")`), so bundles sealed
//! on either side open on the other.

use p256::ecdh::{EphemeralSecret, SharedSecret};
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::aead::SymmetricKey;
use crate::KEY_SIZE;

fn kek_from_shared(shared: &SharedSecret) -> SymmetricKey {
    let digest = Sha256::digest(shared.raw_secret_bytes());
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&digest);
    let kek = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    kek
}

/// Sender side. Generates a one-time key pair, agrees with `recipient`, and
/// returns the KEK plus the ephemeral public half. The ephemeral secret is
/// dropped (and zeroized) before this returns.
pub(crate) fn ephemeral_kek(recipient: &PublicKey) -> (SymmetricKey, PublicKey) {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key();
    let shared = ephemeral.diffie_hellman(recipient);
    (kek_from_shared(&shared), ephemeral_public)
}

/// Receiver side. Redoes the agreement with the bundle's ephemeral key.
pub(crate) fn static_kek(secret: &SecretKey, ephemeral_public: &PublicKey) -> SymmetricKey {
    let shared =
        p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral_public.as_affine());
    kek_from_shared(&shared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_derive_same_kek() {
        let recipient = SecretKey::random(&mut OsRng);
        let (sender_kek, ephemeral_public) = ephemeral_kek(&recipient.public_key());
        let receiver_kek = static_kek(&recipient, &ephemeral_public);
        assert_eq!(sender_kek.as_bytes(), receiver_kek.as_bytes());
    }

    #[test]
    fn other_recipient_derives_different_kek() {
        let recipient = SecretKey::random(&mut OsRng);
        let stranger = SecretKey::random(&mut OsRng);
        let (sender_kek, ephemeral_public) = ephemeral_kek(&recipient.public_key());
        let wrong = static_kek(&stranger, &ephemeral_public);
        assert_ne!(sender_kek.as_bytes(), wrong.as_bytes());
    }

    #[test]
    fn ephemeral_keys_are_not_reused() {
        let recipient = SecretKey::random(&mut OsRng).public_key();
        let (_, a) = ephemeral_kek(&recipient);
        let (_, b) = ephemeral_kek(&recipient);
        assert_ne!(a, b);
    }
}
