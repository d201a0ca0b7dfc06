//! Transport boundary for sealed MediChain records.
//! The ciphertext travels as the raw file body; nonces, the wrapped key and
//! the ephemeral public key ride alongside in a base64 JSON sidecar.

use core::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use medichain_crypto::{SealedFile, WrappedKey, NONCE_SIZE};
use serde::{Deserialize, Serialize};

pub const FIELD_CONTENT_NONCE: &str = "contentNonce";
pub const FIELD_WRAPPED_KEY: &str = "wrappedKey";
pub const FIELD_WRAP_NONCE: &str = "wrapNonce";
pub const FIELD_EPHEMERAL_PUBLIC_KEY: &str = "ephemeralPublicKey";

#[derive(Debug)]
pub enum Error {
    Json(String),
    Base64 { field: &'static str, reason: String },
    FieldLength { field: &'static str, expected: usize, actual: usize },
    Crypto(medichain_crypto::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<medichain_crypto::Error> for Error {
    fn from(e: medichain_crypto::Error) -> Self {
        Self::Crypto(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Json(s) => write!(f, "metadata json: {s}"),
            Error::Base64 { field, reason } => write!(f, "field {field}: invalid base64: {reason}"),
            Error::FieldLength {
                field,
                expected,
                actual,
            } => write!(f, "field {field}: expected {expected} bytes, got {actual}"),
            Error::Crypto(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

/// Standard alphabet, padded: what `btoa` and Python's `b64encode` emit.
pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode one named field. Whitespace (line-wrapped values) is ignored.
pub fn decode_b64(field: &'static str, text: &str) -> Result<Vec<u8>, Error> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| Error::Base64 {
        field,
        reason: e.to_string(),
    })
}

fn decode_nonce(field: &'static str, text: &str) -> Result<[u8; NONCE_SIZE], Error> {
    let bytes = decode_b64(field, text)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| Error::FieldLength {
        field,
        expected: NONCE_SIZE,
        actual,
    })
}

/// JSON sidecar uploaded next to the ciphertext.
///
/// Carries no raw content key; the wrapped key is its only channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedFileMetadata {
    pub content_nonce: String,
    pub wrapped_key: String,
    pub wrap_nonce: String,
    /// SPKI DER, base64.
    pub ephemeral_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl SealedFileMetadata {
    pub fn from_sealed(sealed: &SealedFile) -> Self {
        Self {
            content_nonce: encode_b64(&sealed.content_nonce),
            wrapped_key: encode_b64(&sealed.wrapped_key.ciphertext),
            wrap_nonce: encode_b64(&sealed.wrapped_key.nonce),
            ephemeral_public_key: encode_b64(&sealed.wrapped_key.ephemeral_public_key),
            content_type: None,
            file_name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reassemble the bundle from this sidecar and the downloaded ciphertext.
    pub fn to_sealed(&self, ciphertext: Vec<u8>) -> Result<SealedFile, Error> {
        Ok(SealedFile {
            ciphertext,
            content_nonce: decode_nonce(FIELD_CONTENT_NONCE, &self.content_nonce)?,
            wrapped_key: WrappedKey {
                ciphertext: decode_b64(FIELD_WRAPPED_KEY, &self.wrapped_key)?,
                nonce: decode_nonce(FIELD_WRAP_NONCE, &self.wrap_nonce)?,
                ephemeral_public_key: decode_b64(
                    FIELD_EPHEMERAL_PUBLIC_KEY,
                    &self.ephemeral_public_key,
                )?,
            },
        })
    }
}

/// Split a bundle into the file body and its sidecar.
pub fn split(sealed: SealedFile) -> (Vec<u8>, SealedFileMetadata) {
    let metadata = SealedFileMetadata::from_sealed(&sealed);
    (sealed.ciphertext, metadata)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LegacyWrappedKey {
    #[serde(rename = "wrappedB64")]
    wrapped_b64: String,
    #[serde(rename = "nonceB64")]
    nonce_b64: String,
    #[serde(rename = "ephPubSpkiB64")]
    eph_pub_spki_b64: String,
}

/// Multipart form fields posted by the web upload pages: `file_nonce_b64`
/// plus a `wrapped_key` JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegacyUploadFields {
    pub file_nonce_b64: String,
    pub wrapped_key: String,
    /// Sent by one upload page; never read.
    pub raw_aes_key_b64: Option<String>,
}

impl LegacyUploadFields {
    pub fn from_metadata(metadata: &SealedFileMetadata) -> Result<Self, Error> {
        let wrapped = LegacyWrappedKey {
            wrapped_b64: metadata.wrapped_key.clone(),
            nonce_b64: metadata.wrap_nonce.clone(),
            eph_pub_spki_b64: metadata.ephemeral_public_key.clone(),
        };
        Ok(Self {
            file_nonce_b64: metadata.content_nonce.clone(),
            wrapped_key: serde_json::to_string(&wrapped)?,
            raw_aes_key_b64: None,
        })
    }

    pub fn into_metadata(self) -> Result<SealedFileMetadata, Error> {
        if self.raw_aes_key_b64.is_some() {
            tracing::warn!("ignoring raw_aes_key_b64 form field; the wrapped key is authoritative");
        }
        let wrapped: LegacyWrappedKey = serde_json::from_str(&self.wrapped_key)?;
        Ok(SealedFileMetadata {
            content_nonce: self.file_nonce_b64,
            wrapped_key: wrapped.wrapped_b64,
            wrap_nonce: wrapped.nonce_b64,
            ephemeral_public_key: wrapped.eph_pub_spki_b64,
            content_type: None,
            file_name: None,
        })
    }
}
