//! Persistence of token records.

use crate::error::TokenResult;
use crate::types::{OAuthProvider, SecureToken, TokenType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage for [`SecureToken`] records, unique per (org, provider, type).
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
    ) -> TokenResult<Option<SecureToken>>;

    /// Inserts or replaces the record in its (org, provider, type) slot.
    async fn upsert(&self, token: &SecureToken) -> TokenResult<()>;

    /// Marks the slot `failed` only if it still holds exactly the record
    /// that was read: same ref, ciphertext, status and `updated_at`.
    /// Returns false when a concurrent write replaced it first.
    async fn mark_failed_if_unchanged(&self, read: &SecureToken, reason: &str) -> TokenResult<bool>;

    async fn list(&self, org_id: &str) -> TokenResult<Vec<SecureToken>>;

    /// Deletes every token of the provider for the org. Returns the count.
    async fn delete(&self, org_id: &str, provider: OAuthProvider) -> TokenResult<usize>;
}

type Slot = (String, OAuthProvider, TokenType);

#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<RwLock<HashMap<Slot, SecureToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
    ) -> TokenResult<Option<SecureToken>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(&(org_id.to_string(), provider, token_type)).cloned())
    }

    async fn upsert(&self, token: &SecureToken) -> TokenResult<()> {
        let slot = (token.org_id.clone(), token.provider, token.token_type);
        self.tokens.write().await.insert(slot, token.clone());
        Ok(())
    }

    async fn mark_failed_if_unchanged(&self, read: &SecureToken, reason: &str) -> TokenResult<bool> {
        let slot = (read.org_id.clone(), read.provider, read.token_type);
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(&slot) {
            Some(current) if current.is_same_write(read) => {
                current.mark_failed(reason);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, org_id: &str) -> TokenResult<Vec<SecureToken>> {
        let tokens = self.tokens.read().await;
        let mut out: Vec<SecureToken> = tokens
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect();
        out.sort_by_key(|t| (t.provider.as_str(), t.token_type.as_str()));
        Ok(out)
    }

    async fn delete(&self, org_id: &str, provider: OAuthProvider) -> TokenResult<usize> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|(org, p, _), _| !(org == org_id && *p == provider));
        Ok(before - tokens.len())
    }
}
