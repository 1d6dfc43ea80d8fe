//! DuckDB-backed OAuth token records.

use crate::error::{StorageError, StorageResult};
use crate::{from_millis, lock, to_millis};
use async_trait::async_trait;
use chrono::Utc;
use duckdb::{Connection, OptionalExt, Row, ToSql, params};
use orgvault_crypto::EncryptedBlob;
use orgvault_tokens::{
    EncryptionStatus, OAuthProvider, SecureToken, TokenResult, TokenStore, TokenType,
};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

const COLUMNS: &str = "token_ref, org_id, provider, token_type, encrypted, status, \
                       failure_reason, expires_at, created_at, updated_at";

/// [`TokenStore`] over the `secure_tokens` table. The ciphertext column holds
/// the binary blob layout.
#[derive(Clone)]
pub struct DuckTokenStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckTokenStore {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn select(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
    ) -> StorageResult<Option<SecureToken>> {
        let conn = lock(&self.conn)?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM secure_tokens
                     WHERE org_id = ? AND provider = ? AND token_type = ?"
                ),
                params![org_id, provider.as_str(), token_type.as_str()],
                read_row,
            )
            .optional()?;
        row.map(TokenRow::into_token).transpose()
    }

    fn write(&self, token: &SecureToken) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!("INSERT OR REPLACE INTO secure_tokens ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                token.token_ref,
                token.org_id,
                token.provider.as_str(),
                token.token_type.as_str(),
                token.encrypted.as_ref().map(EncryptedBlob::to_bytes),
                token.status.as_str(),
                token.failure_reason,
                token.expires_at.map(to_millis),
                to_millis(token.created_at),
                to_millis(token.updated_at),
            ],
        )?;
        Ok(())
    }

    fn fail_if_unchanged(&self, read: &SecureToken, reason: &str) -> StorageResult<bool> {
        let failed = EncryptionStatus::Failed.as_str();
        let now = to_millis(Utc::now());
        let updated_at = to_millis(read.updated_at);
        let encrypted = read.encrypted.as_ref().map(EncryptedBlob::to_bytes);
        let (provider, token_type, status) = (
            read.provider.as_str(),
            read.token_type.as_str(),
            read.status.as_str(),
        );

        let mut sql = String::from(
            "UPDATE secure_tokens SET status = ?, failure_reason = ?, updated_at = ?
             WHERE org_id = ? AND provider = ? AND token_type = ?
               AND token_ref = ? AND status = ? AND updated_at = ?",
        );
        let mut args: Vec<&dyn ToSql> = vec![
            &failed,
            &reason,
            &now,
            &read.org_id,
            &provider,
            &token_type,
            &read.token_ref,
            &status,
            &updated_at,
        ];
        // Unparseable ciphertext loads as `None`, so only a parsed blob is
        // compared byte for byte.
        if let Some(bytes) = &encrypted {
            sql.push_str(" AND encrypted = ?");
            args.push(bytes);
        }

        let conn = lock(&self.conn)?;
        Ok(conn.execute(&sql, args.as_slice())? > 0)
    }

    fn select_org(&self, org_id: &str) -> StorageResult<Vec<SecureToken>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM secure_tokens WHERE org_id = ? ORDER BY provider, token_type"
        ))?;
        let rows = stmt
            .query_map(params![org_id], read_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(TokenRow::into_token).collect()
    }

    fn remove(&self, org_id: &str, provider: OAuthProvider) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        Ok(conn.execute(
            "DELETE FROM secure_tokens WHERE org_id = ? AND provider = ?",
            params![org_id, provider.as_str()],
        )?)
    }
}

#[async_trait]
impl TokenStore for DuckTokenStore {
    async fn get(
        &self,
        org_id: &str,
        provider: OAuthProvider,
        token_type: TokenType,
    ) -> TokenResult<Option<SecureToken>> {
        Ok(self.select(org_id, provider, token_type)?)
    }

    async fn upsert(&self, token: &SecureToken) -> TokenResult<()> {
        Ok(self.write(token)?)
    }

    async fn mark_failed_if_unchanged(&self, read: &SecureToken, reason: &str) -> TokenResult<bool> {
        Ok(self.fail_if_unchanged(read, reason)?)
    }

    async fn list(&self, org_id: &str) -> TokenResult<Vec<SecureToken>> {
        Ok(self.select_org(org_id)?)
    }

    async fn delete(&self, org_id: &str, provider: OAuthProvider) -> TokenResult<usize> {
        Ok(self.remove(org_id, provider)?)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

struct TokenRow {
    token_ref: String,
    org_id: String,
    provider: String,
    token_type: String,
    encrypted: Option<Vec<u8>>,
    status: String,
    failure_reason: Option<String>,
    expires_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn read_row(row: &Row<'_>) -> duckdb::Result<TokenRow> {
    Ok(TokenRow {
        token_ref: row.get(0)?,
        org_id: row.get(1)?,
        provider: row.get(2)?,
        token_type: row.get(3)?,
        encrypted: row.get(4)?,
        status: row.get(5)?,
        failure_reason: row.get(6)?,
        expires_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl TokenRow {
    fn into_token(self) -> StorageResult<SecureToken> {
        let corrupt = |e: orgvault_tokens::TokenError| StorageError::Corrupt(e.to_string());

        // Unparseable ciphertext loads as `encrypted: None`; the vault marks
        // such `ok` records failed on read.
        let encrypted = match self.encrypted {
            Some(bytes) => match EncryptedBlob::from_bytes(&bytes) {
                Ok(blob) => Some(blob),
                Err(e) => {
                    warn!(token_ref = %self.token_ref, "stored token ciphertext unreadable: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(SecureToken {
            provider: OAuthProvider::from_str(&self.provider).map_err(corrupt)?,
            token_type: TokenType::from_str(&self.token_type).map_err(corrupt)?,
            status: self.status.parse().map_err(corrupt)?,
            encrypted,
            failure_reason: self.failure_reason,
            expires_at: self.expires_at.map(from_millis).transpose()?,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
            token_ref: self.token_ref,
            org_id: self.org_id,
        })
    }
}
