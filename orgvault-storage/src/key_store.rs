//! DuckDB-backed wrapped DEK versions.

use crate::error::{StorageError, StorageResult};
use crate::{from_millis, lock, to_millis};
use async_trait::async_trait;
use duckdb::{Connection, OptionalExt, Row, params};
use orgvault_keys::store::check_next_version;
use orgvault_keys::{OrgCryptoResult, OrgKeyStore, WrappedDek};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// [`OrgKeyStore`] over the `org_deks` table.
#[derive(Clone)]
pub struct DuckOrgKeyStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckOrgKeyStore {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn select_one(&self, sql: &str, org_id: &str, version: Option<u32>) -> StorageResult<Option<WrappedDek>> {
        let conn = lock(&self.conn)?;
        let row = match version {
            Some(v) => conn
                .query_row(sql, params![org_id, i64::from(v)], read_row)
                .optional()?,
            None => conn.query_row(sql, params![org_id], read_row).optional()?,
        };
        row.map(into_wrapped_dek).transpose()
    }

    fn install(&self, dek: &WrappedDek) -> OrgCryptoResult<()> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction().map_err(StorageError::from)?;

        let current = current_version(&tx, &dek.org_id)?;
        check_next_version(&dek.org_id, current, dek.version)?;

        tx.execute(
            "INSERT INTO org_deks (org_id, version, wrapped_key, created_at) VALUES (?, ?, ?, ?)",
            params![
                dek.org_id,
                i64::from(dek.version),
                dek.wrapped_key,
                to_millis(dek.created_at)
            ],
        )
        .map_err(StorageError::from)?;
        tx.commit().map_err(StorageError::from)?;

        debug!(org_id = %dek.org_id, version = dek.version, "stored wrapped DEK");
        Ok(())
    }

    fn delete(&self, org_id: &str, version: u32) -> StorageResult<bool> {
        let conn = lock(&self.conn)?;
        let affected = conn.execute(
            "DELETE FROM org_deks WHERE org_id = ? AND version = ?",
            params![org_id, i64::from(version)],
        )?;
        Ok(affected > 0)
    }

    fn versions(&self, org_id: &str) -> StorageResult<Vec<u32>> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT version FROM org_deks WHERE org_id = ? ORDER BY version")?;
        let raw = stmt
            .query_map(params![org_id], |row| row.get::<_, i64>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        raw.into_iter().map(version_from_db).collect()
    }
}

#[async_trait]
impl OrgKeyStore for DuckOrgKeyStore {
    async fn active_dek(&self, org_id: &str) -> OrgCryptoResult<Option<WrappedDek>> {
        Ok(self.select_one(
            "SELECT org_id, version, wrapped_key, created_at FROM org_deks
             WHERE org_id = ? ORDER BY version DESC LIMIT 1",
            org_id,
            None,
        )?)
    }

    async fn dek_version(&self, org_id: &str, version: u32) -> OrgCryptoResult<Option<WrappedDek>> {
        Ok(self.select_one(
            "SELECT org_id, version, wrapped_key, created_at FROM org_deks
             WHERE org_id = ? AND version = ?",
            org_id,
            Some(version),
        )?)
    }

    async fn install_dek(&self, dek: WrappedDek) -> OrgCryptoResult<()> {
        self.install(&dek)
    }

    async fn retire_dek(&self, org_id: &str, version: u32) -> OrgCryptoResult<bool> {
        Ok(self.delete(org_id, version)?)
    }

    async fn retained_versions(&self, org_id: &str) -> OrgCryptoResult<Vec<u32>> {
        Ok(self.versions(org_id)?)
    }
}

type DekRow = (String, i64, Vec<u8>, i64);

fn read_row(row: &Row<'_>) -> duckdb::Result<DekRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_wrapped_dek((org_id, version, wrapped_key, created_at): DekRow) -> StorageResult<WrappedDek> {
    Ok(WrappedDek {
        org_id,
        version: version_from_db(version)?,
        wrapped_key,
        created_at: from_millis(created_at)?,
    })
}

fn current_version(conn: &Connection, org_id: &str) -> StorageResult<Option<u32>> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(version) FROM org_deks WHERE org_id = ?",
        params![org_id],
        |row| row.get(0),
    )?;
    max.map(version_from_db).transpose()
}

fn version_from_db(raw: i64) -> StorageResult<u32> {
    u32::try_from(raw).map_err(|_| StorageError::Corrupt(format!("DEK version {raw} out of range")))
}
