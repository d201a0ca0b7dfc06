//! Encryptor and Decryptor.
//!
//! ```text
//! encrypt:  content_key  = random 256-bit
//!           ciphertext   = AES-GCM(content_key, content_nonce, plaintext)
//!           (eph, E)     = fresh P-256 key pair
//!           kek          = SHA-256(ECDH(eph, recipient).x)
//!           wrapped_key  = AES-GCM(kek, wrap_nonce, content_key)
//!           -> { ciphertext, content_nonce, wrapped_key, wrap_nonce, SPKI(E) }
//!
//! decrypt:  kek          = SHA-256(ECDH(recipient_secret, E).x)
//!           content_key  = AES-GCM-open(kek, wrap_nonce, wrapped_key)
//!           plaintext    = AES-GCM-open(content_key, content_nonce, ciphertext)
//! ```

use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::aead::{random_nonce, SymmetricKey};
use crate::keys::{RecipientPrivateKey, RecipientPublicKey};
use crate::{kek, Result, Stage, NONCE_SIZE};

/// The content key, sealed to one recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedKey {
    /// AES-GCM ciphertext of the 32-byte content key, tag included.
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    /// SPKI DER of the one-time sender key.
    pub ephemeral_public_key: Vec<u8>,
}

/// Output of [`encrypt`]; everything [`decrypt`] needs besides the private key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedFile {
    /// File ciphertext with the 16-byte tag appended.
    pub ciphertext: Vec<u8>,
    pub content_nonce: [u8; NONCE_SIZE],
    pub wrapped_key: WrappedKey,
}

/// Encrypt `plaintext` so that only the holder of the private half of
/// `recipient` can read it.
pub fn encrypt(plaintext: &[u8], recipient: &RecipientPublicKey) -> Result<SealedFile> {
    let content_key = SymmetricKey::generate();
    let content_nonce = random_nonce();
    let ciphertext = content_key.seal(&content_nonce, plaintext)?;

    let wrapped_key = wrap_content_key(&content_key, recipient)?;

    debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "file sealed"
    );
    Ok(SealedFile {
        ciphertext,
        content_nonce,
        wrapped_key,
    })
}

fn wrap_content_key(
    content_key: &SymmetricKey,
    recipient: &RecipientPublicKey,
) -> Result<WrappedKey> {
    let (kek, ephemeral_public) = kek::ephemeral_kek(recipient.as_inner());
    let nonce = random_nonce();
    let ciphertext = kek.seal(&nonce, content_key.as_bytes())?;
    let ephemeral_public_key = RecipientPublicKey::from(ephemeral_public).to_spki_der()?;
    trace!(wrapped_len = ciphertext.len(), "content key wrapped");
    Ok(WrappedKey {
        ciphertext,
        nonce,
        ephemeral_public_key,
    })
}

/// Recover the plaintext of `sealed` with the recipient's private key.
///
/// Fails with [`Error::AuthenticationFailure`](crate::Error::AuthenticationFailure)
/// on a wrong key or any tampering; no partial plaintext is ever returned.
pub fn decrypt(sealed: &SealedFile, private_key: &RecipientPrivateKey) -> Result<Vec<u8>> {
    let content_key = unwrap_content_key(&sealed.wrapped_key, private_key)?;
    let plaintext =
        content_key.open(&sealed.content_nonce, &sealed.ciphertext, Stage::Content)?;
    debug!(plaintext_len = plaintext.len(), "file opened");
    Ok(plaintext)
}

fn unwrap_content_key(
    wrapped: &WrappedKey,
    private_key: &RecipientPrivateKey,
) -> Result<SymmetricKey> {
    let ephemeral = RecipientPublicKey::from_spki_der(&wrapped.ephemeral_public_key)?;
    let kek = kek::static_kek(private_key.as_inner(), ephemeral.as_inner());
    let raw = Zeroizing::new(kek.open(&wrapped.nonce, &wrapped.ciphertext, Stage::KeyUnwrap)?);
    trace!("content key unwrapped");
    SymmetricKey::from_slice(&raw)
}
