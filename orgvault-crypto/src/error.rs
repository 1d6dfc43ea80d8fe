//! Field cipher error types.

use thiserror::Error;

/// Result type for cipher operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening a field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Tag mismatch: tampered ciphertext, wrong key, or wrong context.
    #[error("authentication failed (wrong key, wrong context, or tampered data)")]
    AuthenticationFailed,

    /// The blob is structurally corrupt (length, format byte, unknown context).
    #[error("malformed blob: {0}")]
    MalformedBlob(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption failed: {0}")]
    Encryption(String),
}
