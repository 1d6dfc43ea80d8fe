//! KMS error types.

use std::fmt;
use thiserror::Error;

/// Result type for KMS operations.
pub type KmsResult<T> = Result<T, KmsError>;

/// Errors surfaced by a KMS provider, normalized across providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KmsError {
    /// Network failure, timeout, throttling, or a 5xx from the provider.
    #[error("KMS unavailable: {0}")]
    Unavailable(String),

    #[error("KMS permission denied: {0}")]
    PermissionDenied(String),

    /// The provider refused to unwrap the supplied ciphertext.
    #[error("KMS rejected ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("KMS key not found: {0}")]
    KeyNotFound(String),

    #[error("invalid KMS configuration: {0}")]
    Config(String),

    /// Unexpected provider response that fits no other category.
    #[error("KMS provider error: {0}")]
    Provider(String),
}

impl KmsError {
    /// Only transient outages are worth retrying. Callers own the retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KmsError::Unavailable(_))
    }
}

/// The KMS call an error came from, used in error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KmsOperation {
    Wrap,
    Unwrap,
    GenerateDataKey,
}

impl fmt::Display for KmsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KmsOperation::Wrap => "wrap",
            KmsOperation::Unwrap => "unwrap",
            KmsOperation::GenerateDataKey => "generate data key",
        })
    }
}
