use medichain_crypto::{decrypt, encrypt, generate_key_pair, Error as CryptoError};
use medichain_wire::{decode_b64, encode_b64, split, Error, LegacyUploadFields, SealedFileMetadata};
use proptest::prelude::*;

#[test]
fn upload_then_download() {
    let (secret, public) = generate_key_pair();
    let sealed = encrypt(b"MRI report, page 1", &public).unwrap();

    // Upload: body + sidecar JSON.
    let (body, metadata) = split(sealed);
    let json = metadata
        .with_content_type("text/plain")
        .with_file_name("report.txt")
        .to_json()
        .unwrap();

    // Download: parse sidecar and reassemble.
    let metadata = SealedFileMetadata::from_json(&json).unwrap();
    assert_eq!(metadata.file_name.as_deref(), Some("report.txt"));
    let sealed = metadata.to_sealed(body).unwrap();
    assert_eq!(decrypt(&sealed, &secret).unwrap(), b"MRI report, page 1");
}

#[test]
fn legacy_form_upload_decrypts() {
    let (secret, public) = generate_key_pair();
    let (body, metadata) = split(encrypt(b"x-ray", &public).unwrap());
    let fields = LegacyUploadFields::from_metadata(&metadata).unwrap();
    let sealed = fields.into_metadata().unwrap().to_sealed(body).unwrap();
    assert_eq!(decrypt(&sealed, &secret).unwrap(), b"x-ray");
}

#[test]
fn tampered_sidecar_fails_authentication() {
    let (secret, public) = generate_key_pair();
    let (body, mut metadata) = split(encrypt(b"prescription", &public).unwrap());
    let mut nonce = decode_b64("contentNonce", &metadata.content_nonce).unwrap();
    nonce[0] ^= 0x80;
    metadata.content_nonce = encode_b64(&nonce);
    let sealed = metadata.to_sealed(body).unwrap();
    assert!(matches!(
        decrypt(&sealed, &secret).map_err(Error::from),
        Err(Error::Crypto(CryptoError::AuthenticationFailure(_)))
    ));
}

proptest! {
    #[test]
    fn base64_is_lossless(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
        prop_assert_eq!(decode_b64("ciphertext", &encode_b64(&bytes)).unwrap(), bytes);
    }
}
