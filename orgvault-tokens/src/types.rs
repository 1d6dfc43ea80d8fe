//! Token records and the enums persisted with them.

use crate::error::TokenError;
use chrono::{DateTime, Utc};
use orgvault_crypto::{EncryptedBlob, FieldContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Microsoft,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Microsoft => "microsoft",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "microsoft" => Ok(OAuthProvider::Microsoft),
            other => Err(TokenError::InvalidValue(format!("unknown provider {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "oauth_access")]
    OAuthAccess,
    #[serde(rename = "oauth_refresh")]
    OAuthRefresh,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::OAuthAccess => "oauth_access",
            TokenType::OAuthRefresh => "oauth_refresh",
        }
    }

    /// The one context every token of this type is sealed under. It does not
    /// vary by provider or external account, so reads always match writes.
    pub fn context(self) -> FieldContext {
        match self {
            TokenType::OAuthAccess => FieldContext::OAuthAccess,
            TokenType::OAuthRefresh => FieldContext::OAuthRefresh,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oauth_access" => Ok(TokenType::OAuthAccess),
            "oauth_refresh" => Ok(TokenType::OAuthRefresh),
            other => Err(TokenError::InvalidValue(format!("unknown token type {other:?}"))),
        }
    }
}

/// Where a token is in its write lifecycle.
///
/// `Pending` → `Ok` on a verified write, or → `Failed` on any KMS or cipher
/// error. A `Failed` token is never retried in place; it needs new OAuth
/// consent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionStatus {
    Pending,
    Ok,
    Failed,
}

impl EncryptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EncryptionStatus::Pending => "pending",
            EncryptionStatus::Ok => "ok",
            EncryptionStatus::Failed => "failed",
        }
    }
}

impl FromStr for EncryptionStatus {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EncryptionStatus::Pending),
            "ok" => Ok(EncryptionStatus::Ok),
            "failed" => Ok(EncryptionStatus::Failed),
            other => Err(TokenError::InvalidValue(format!("unknown status {other:?}"))),
        }
    }
}

/// A persisted OAuth token. One record per (org, provider, token type).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureToken {
    /// Opaque lookup key, `tok_<uuid>`. Stable across refreshes.
    pub token_ref: String,
    pub org_id: String,
    pub provider: OAuthProvider,
    pub token_type: TokenType,
    pub encrypted: Option<EncryptedBlob>,
    pub status: EncryptionStatus,
    pub failure_reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecureToken {
    pub fn pending(
        org_id: impl Into<String>,
        provider: OAuthProvider,
        token_type: TokenType,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_ref: new_token_ref(),
            org_id: org_id.into(),
            provider,
            token_type,
            encrypted: None,
            status: EncryptionStatus::Pending,
            failure_reason: None,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// True when `other` is the same stored write of this slot.
    pub(crate) fn is_same_write(&self, other: &SecureToken) -> bool {
        self.token_ref == other.token_ref
            && self.status == other.status
            && self.updated_at == other.updated_at
            && self.encrypted == other.encrypted
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = EncryptionStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
    }
}

pub fn new_token_ref() -> String {
    format!("tok_{}", Uuid::new_v4())
}

/// Coarse view of a token slot, without touching ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPresence {
    Encrypted,
    Pending,
    Failed,
    Missing,
}

impl From<Option<&SecureToken>> for TokenPresence {
    fn from(token: Option<&SecureToken>) -> Self {
        match token.map(|t| t.status) {
            None => TokenPresence::Missing,
            Some(EncryptionStatus::Ok) => TokenPresence::Encrypted,
            Some(EncryptionStatus::Pending) => TokenPresence::Pending,
            Some(EncryptionStatus::Failed) => TokenPresence::Failed,
        }
    }
}
