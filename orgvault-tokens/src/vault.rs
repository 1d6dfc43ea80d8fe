//! Encrypted storage and retrieval of OAuth tokens.

use crate::error::{TokenError, TokenResult};
use crate::store::TokenStore;
use crate::types::{EncryptionStatus, OAuthProvider, SecureToken, TokenPresence, TokenType};
use chrono::{DateTime, Utc};
use orgvault_keys::{OrgCrypto, OrgCryptoError};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// OAuth token storage on top of the org crypto facade.
#[derive(Clone)]
pub struct TokenVault {
    crypto: OrgCrypto,
    store: Arc<dyn TokenStore>,
}

impl TokenVault {
    pub fn new(crypto: OrgCrypto, store: Arc<dyn TokenStore>) -> Self {
        Self { crypto, store }
    }

    /// Encrypts and persists a token, replacing any previous one in the slot.
    ///
    /// The record is written as `pending` first, then `ok` once the
    /// ciphertext has been decrypted back and compared. On failure it is left
    /// `failed` with the reason, and the error is returned.
    pub async fn store_token(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
        plaintext: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> TokenResult<SecureToken> {
        let mut record = match self.store.get(org_id, provider, token_type).await? {
            Some(mut existing) => {
                existing.status = EncryptionStatus::Pending;
                existing.encrypted = None;
                existing.failure_reason = None;
                existing.expires_at = expires_at;
                existing.updated_at = Utc::now();
                existing
            }
            None => SecureToken::pending(org_id, provider, token_type, expires_at),
        };
        self.store.upsert(&record).await?;

        match self.seal_and_verify(org_id, token_type, plaintext).await {
            Ok(blob) => {
                record.encrypted = Some(blob);
                record.status = EncryptionStatus::Ok;
                record.updated_at = Utc::now();
                self.store.upsert(&record).await?;
                info!(org_id, %provider, %token_type, token_ref = %record.token_ref, "stored token");
                Ok(record)
            }
            Err(e) => {
                warn!(org_id, %provider, %token_type, "token encryption failed: {e}");
                record.mark_failed(e.to_string());
                self.store.upsert(&record).await?;
                Err(TokenError::Crypto(e))
            }
        }
    }

    async fn seal_and_verify(
        &self,
        org_id: &str,
        token_type: TokenType,
        plaintext: &str,
    ) -> Result<orgvault_crypto::EncryptedBlob, OrgCryptoError> {
        let context = token_type.context();
        let blob = self
            .crypto
            .encrypt_str_for_org(org_id, plaintext, context)
            .await?;
        let check = Zeroizing::new(self.crypto.decrypt_str_for_org(org_id, &blob, context).await?);
        if check.as_str() != plaintext {
            return Err(OrgCryptoError::Encryption(
                "token did not survive a decrypt check".into(),
            ));
        }
        Ok(blob)
    }

    /// Decrypts a stored token.
    ///
    /// A tag or structure failure marks the record `failed`, since the
    /// ciphertext can never be opened again. KMS outages leave it untouched.
    pub async fn retrieve_token(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
    ) -> TokenResult<Zeroizing<String>> {
        let record = self
            .store
            .get(org_id, provider, token_type)
            .await?
            .ok_or_else(|| TokenError::Missing {
                org_id: org_id.to_string(),
                provider,
                token_type,
            })?;

        match record.status {
            EncryptionStatus::Failed => {
                return Err(TokenError::ReprovisionRequired {
                    token_ref: record.token_ref,
                    reason: record
                        .failure_reason
                        .unwrap_or_else(|| "token previously failed".into()),
                });
            }
            EncryptionStatus::Pending => {
                return Err(TokenError::NotReady {
                    token_ref: record.token_ref,
                });
            }
            EncryptionStatus::Ok => {}
        }

        let Some(blob) = record.encrypted.clone() else {
            let reason = "token marked ok but has no ciphertext";
            self.mark_failed_if_unchanged(&record, reason).await?;
            return Err(TokenError::ReprovisionRequired {
                token_ref: record.token_ref,
                reason: reason.into(),
            });
        };

        match self
            .crypto
            .decrypt_str_for_org(org_id, &blob, token_type.context())
            .await
        {
            Ok(token) => {
                debug!(org_id, %provider, %token_type, "retrieved token");
                Ok(Zeroizing::new(token))
            }
            Err(e) if e.is_field_level() => {
                warn!(
                    org_id,
                    %provider,
                    %token_type,
                    token_ref = %record.token_ref,
                    "stored token is unreadable, marking failed: {e}"
                );
                self.mark_failed_if_unchanged(&record, &e.to_string()).await?;
                Err(TokenError::Crypto(e))
            }
            Err(e) => Err(TokenError::Crypto(e)),
        }
    }

    async fn mark_failed_if_unchanged(&self, read: &SecureToken, reason: &str) -> TokenResult<()> {
        if !self.store.mark_failed_if_unchanged(read, reason).await? {
            debug!(
                org_id = %read.org_id,
                provider = %read.provider,
                token_type = %read.token_type,
                "token was replaced since it was read, leaving it as is"
            );
        }
        Ok(())
    }

    /// Status of a token slot without decrypting anything.
    pub async fn token_status(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
    ) -> TokenResult<TokenPresence> {
        let record = self.store.get(org_id, provider, token_type).await?;
        Ok(TokenPresence::from(record.as_ref()))
    }

    /// Token metadata (including ciphertext) without decrypting.
    pub async fn token_record(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
    ) -> TokenResult<Option<SecureToken>> {
        self.store.get(org_id, provider, token_type).await
    }

    pub async fn list_tokens(&self, org_id: &str) -> TokenResult<Vec<SecureToken>> {
        self.store.list(org_id).await
    }

    /// Deletes every token the org holds for the provider (account
    /// disconnect). Returns how many records were removed.
    pub async fn purge(&self, org_id: &str, provider: OAuthProvider) -> TokenResult<usize> {
        let removed = self.store.delete(org_id, provider).await?;
        info!(org_id, %provider, removed, "purged tokens");
        Ok(removed)
    }
}
