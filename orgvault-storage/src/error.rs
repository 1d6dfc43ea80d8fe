//! Storage errors and their mapping into the key and token error types.

use orgvault_keys::OrgCryptoError;
use orgvault_tokens::TokenError;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("connection lock poisoned")]
    Poisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<StorageError> for OrgCryptoError {
    fn from(err: StorageError) -> Self {
        OrgCryptoError::Storage(err.to_string())
    }
}

impl From<StorageError> for TokenError {
    fn from(err: StorageError) -> Self {
        TokenError::Storage(err.to_string())
    }
}
