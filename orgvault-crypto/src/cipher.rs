//! XChaCha20-Poly1305 sealing and opening of individual fields.

use crate::blob::{EncryptedBlob, NONCE_SIZE, TAG_SIZE};
use crate::context::FieldContext;
use crate::error::{CryptoError, CryptoResult};
use crate::key::DataKey;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

fn cipher_for(key: &DataKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()))
}

/// Encrypts `plaintext` for `context` under `key`.
///
/// `key_version` is the organization DEK version the key was installed
/// under; it is stamped into the blob so decryption can pick the right key
/// after a rotation.
pub fn encrypt(
    key: &DataKey,
    key_version: u32,
    plaintext: &[u8],
    context: FieldContext,
) -> CryptoResult<EncryptedBlob> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let aad = EncryptedBlob::associated_data(key_version, context);
    let ciphertext = cipher_for(key)
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| CryptoError::Encryption(format!("seal failed: {e}")))?;

    Ok(EncryptedBlob {
        dek_version: key_version,
        context,
        nonce,
        ciphertext,
    })
}

/// Decrypts `blob` as a value of `context`.
///
/// Fails with [`CryptoError::AuthenticationFailed`] when the key, the
/// context, or any byte of the blob differs from what was sealed.
pub fn decrypt(key: &DataKey, blob: &EncryptedBlob, context: FieldContext) -> CryptoResult<Vec<u8>> {
    if blob.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::MalformedBlob(format!(
            "ciphertext shorter than tag: {} bytes",
            blob.ciphertext.len()
        )));
    }

    let aad = EncryptedBlob::associated_data(blob.dek_version, context);
    cipher_for(key)
        .decrypt(
            XNonce::from_slice(&blob.nonce),
            Payload {
                msg: &blob.ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}

pub fn encrypt_string(
    key: &DataKey,
    key_version: u32,
    plaintext: &str,
    context: FieldContext,
) -> CryptoResult<EncryptedBlob> {
    encrypt(key, key_version, plaintext.as_bytes(), context)
}

pub fn decrypt_string(key: &DataKey, blob: &EncryptedBlob, context: FieldContext) -> CryptoResult<String> {
    let bytes = decrypt(key, blob, context)?;
    String::from_utf8(bytes)
        .map_err(|_| CryptoError::MalformedBlob("plaintext is not valid UTF-8".into()))
}
