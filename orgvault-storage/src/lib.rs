//! DuckDB persistence for orgvault.
//!
//! [`OrgVaultDb`] owns a single connection. The [`DuckOrgKeyStore`] and
//! [`DuckTokenStore`] it hands out share that connection, so a deployment
//! keeps wrapped DEKs and token records in one database file.
//!
//! Timestamps are stored as Unix milliseconds.

mod error;
mod key_store;
mod token_store;

pub use error::{StorageError, StorageResult};
pub use key_store::DuckOrgKeyStore;
pub use token_store::DuckTokenStore;

use chrono::{DateTime, Utc};
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// DuckDB defaults to most of the host's RAM and every core.
pub const DEFAULT_MEMORY_LIMIT: &str = "256MB";
pub const DEFAULT_THREADS: u32 = 2;

#[derive(Clone)]
pub struct OrgVaultDb {
    conn: Arc<Mutex<Connection>>,
}

impl OrgVaultDb {
    /// Opens or creates the database file and its tables.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = open_duckdb_with_wal_recovery(path, DEFAULT_MEMORY_LIMIT, DEFAULT_THREADS)?;
        let db = Self::from_connection(conn)?;
        info!(path = %path.display(), "opened orgvault database");
        Ok(db)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn key_store(&self) -> DuckOrgKeyStore {
        DuckOrgKeyStore::new(Arc::clone(&self.conn))
    }

    pub fn token_store(&self) -> DuckTokenStore {
        DuckTokenStore::new(Arc::clone(&self.conn))
    }
}

// ============================================================================
// Connection helpers
// ============================================================================

/// Opens a DuckDB file, removing a stale WAL left by an unclean shutdown and
/// retrying once if the first open fails.
pub fn open_duckdb_with_wal_recovery(
    path: &Path,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<Connection> {
    let conn = match Connection::open(path) {
        Ok(c) => c,
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if !wal_path.exists() || std::fs::remove_file(&wal_path).is_err() {
                return Err(first_err.into());
            }
            warn!(wal = %wal_path.display(), "DuckDB open failed, removed stale WAL and retrying");
            Connection::open(path)?
        }
    };
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{memory_limit}'; PRAGMA threads={threads};"
    ))?;
    Ok(conn)
}

fn ensure_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS org_deks (
            org_id VARCHAR NOT NULL,
            version BIGINT NOT NULL,
            wrapped_key BLOB NOT NULL,
            created_at BIGINT NOT NULL,
            PRIMARY KEY (org_id, version)
        );
        CREATE TABLE IF NOT EXISTS secure_tokens (
            org_id VARCHAR NOT NULL,
            provider VARCHAR NOT NULL,
            token_type VARCHAR NOT NULL,
            token_ref VARCHAR NOT NULL,
            encrypted BLOB,
            status VARCHAR NOT NULL,
            failure_reason VARCHAR,
            expires_at BIGINT,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL,
            PRIMARY KEY (org_id, provider, token_type)
        );",
    )?;
    Ok(())
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> StorageResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| StorageError::Poisoned)
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp {ms} out of range")))
}
