use orgvault_keys::OrgCryptoError;
use orgvault_kms::KmsError;
use orgvault_storage::StorageError;
use orgvault_tokens::TokenError;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("KMS: {0}")]
    Kms(#[from] KmsError),

    #[error("org crypto: {0}")]
    Crypto(#[from] OrgCryptoError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("token vault: {0}")]
    Token(#[from] TokenError),
}
