//! The ciphertext unit stored in place of a sensitive column.
//!
//! Binary layout (big-endian integers):
//!
//! ```text
//! [format:1][dek_version:4][context_code:2][nonce:24][ciphertext || tag:16]
//! ```
//!
//! The text form is standard base64 of the binary form.

use crate::context::FieldContext;
use crate::error::{CryptoError, CryptoResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Current (and only) blob format byte.
pub const BLOB_FORMAT_V1: u8 = 0x01;

/// XChaCha20 nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Bytes before the ciphertext: format, version, context code, nonce.
pub const HEADER_SIZE: usize = 1 + 4 + 2 + NONCE_SIZE;

/// An encrypted field value bound to its organization key version and context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Version of the organization DEK that sealed this blob.
    pub dek_version: u32,
    /// Field the blob was sealed for. Informational; authentication uses the
    /// context supplied by the caller.
    pub context: FieldContext,
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the Poly1305 tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Serializes to the single-column binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        out.push(BLOB_FORMAT_V1);
        out.extend_from_slice(&self.dek_version.to_be_bytes());
        out.extend_from_slice(&self.context.code().to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses the binary layout. Any structural problem is `MalformedBlob`.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < HEADER_SIZE + TAG_SIZE {
            return Err(CryptoError::MalformedBlob(format!(
                "blob too short: {} bytes, need at least {}",
                bytes.len(),
                HEADER_SIZE + TAG_SIZE
            )));
        }

        let (header, ciphertext) = bytes.split_at(HEADER_SIZE);
        if header[0] != BLOB_FORMAT_V1 {
            return Err(CryptoError::MalformedBlob(format!(
                "unsupported blob format 0x{:02x}",
                header[0]
            )));
        }

        let dek_version = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        let context = FieldContext::from_code(u16::from_be_bytes([header[5], header[6]]))?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&header[7..HEADER_SIZE]);

        Ok(Self {
            dek_version,
            context,
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::MalformedBlob(format!("base64 decode failed: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Associated data authenticated alongside the ciphertext.
    pub(crate) fn associated_data(dek_version: u32, context: FieldContext) -> Vec<u8> {
        let name = context.as_str().as_bytes();
        let mut aad = Vec::with_capacity(5 + name.len());
        aad.push(BLOB_FORMAT_V1);
        aad.extend_from_slice(&dek_version.to_be_bytes());
        aad.extend_from_slice(name);
        aad
    }
}
