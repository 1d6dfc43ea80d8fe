//! Token vault error types.

use crate::types::{OAuthProvider, TokenType};
use orgvault_keys::OrgCryptoError;
use thiserror::Error;

pub type TokenResult<T> = Result<T, TokenError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("no {token_type} token stored for org {org_id} ({provider})")]
    Missing {
        org_id: String,
        provider: OAuthProvider,
        token_type: TokenType,
    },

    /// The stored ciphertext can never be opened again; the account must be
    /// reconnected.
    #[error("token {token_ref} must be re-provisioned: {reason}")]
    ReprovisionRequired { token_ref: String, reason: String },

    /// A write is in flight (or was interrupted before completion).
    #[error("token {token_ref} is not ready")]
    NotReady { token_ref: String },

    #[error(transparent)]
    Crypto(#[from] OrgCryptoError),

    #[error("token store error: {0}")]
    Storage(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl TokenError {
    /// True when only new OAuth consent can fix the token.
    pub fn requires_reconnect(&self) -> bool {
        match self {
            TokenError::Missing { .. } | TokenError::ReprovisionRequired { .. } => true,
            TokenError::Crypto(e) => {
                e.is_field_level() || matches!(e, OrgCryptoError::DekUnavailable { .. })
            }
            _ => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TokenError::Crypto(e) => e.is_retryable(),
            TokenError::NotReady { .. } | TokenError::Storage(_) => true,
            _ => false,
        }
    }
}
