//! Persistence of wrapped organization DEKs.

use crate::error::{OrgCryptoError, OrgCryptoResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A KMS-wrapped DEK as stored per organization and version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedDek {
    pub org_id: String,
    /// Monotonic, starting at 1. The highest installed version is active.
    pub version: u32,
    /// Ciphertext returned by the KMS. Never the plaintext key.
    pub wrapped_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl WrappedDek {
    pub fn new(org_id: impl Into<String>, version: u32, wrapped_key: Vec<u8>) -> Self {
        Self {
            org_id: org_id.into(),
            version,
            wrapped_key,
            created_at: Utc::now(),
        }
    }
}

/// Storage for wrapped DEKs.
///
/// Implementations must make `install_dek` atomic: a record is accepted only
/// when its version is exactly one above the current highest (or 1 for an
/// organization without keys), otherwise `VersionConflict`.
#[async_trait]
pub trait OrgKeyStore: Send + Sync {
    /// The highest retained version for the organization.
    async fn active_dek(&self, org_id: &str) -> OrgCryptoResult<Option<WrappedDek>>;

    async fn dek_version(&self, org_id: &str, version: u32) -> OrgCryptoResult<Option<WrappedDek>>;

    async fn install_dek(&self, dek: WrappedDek) -> OrgCryptoResult<()>;

    /// Deletes one version. Returns false when it was not present.
    async fn retire_dek(&self, org_id: &str, version: u32) -> OrgCryptoResult<bool>;

    /// Retained versions in ascending order.
    async fn retained_versions(&self, org_id: &str) -> OrgCryptoResult<Vec<u32>>;
}

/// Checks the compare-and-set rule for a new version against the current one.
pub fn check_next_version(org_id: &str, current: Option<u32>, proposed: u32) -> OrgCryptoResult<()> {
    let Some(expected) = current.map_or(Some(1), |v| v.checked_add(1)) else {
        return Err(OrgCryptoError::InvalidVersion {
            org_id: org_id.to_string(),
            version: proposed,
            reason: "DEK version space exhausted".to_string(),
        });
    };
    if proposed == expected {
        Ok(())
    } else {
        Err(OrgCryptoError::VersionConflict {
            org_id: org_id.to_string(),
            expected: proposed.saturating_sub(1),
            found: current.unwrap_or(0),
        })
    }
}

/// In-memory key store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct MemoryOrgKeyStore {
    orgs: Arc<RwLock<HashMap<String, BTreeMap<u32, WrappedDek>>>>,
}

impl MemoryOrgKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrgKeyStore for MemoryOrgKeyStore {
    async fn active_dek(&self, org_id: &str) -> OrgCryptoResult<Option<WrappedDek>> {
        let orgs = self.orgs.read().await;
        Ok(orgs
            .get(org_id)
            .and_then(|versions| versions.values().next_back())
            .cloned())
    }

    async fn dek_version(&self, org_id: &str, version: u32) -> OrgCryptoResult<Option<WrappedDek>> {
        let orgs = self.orgs.read().await;
        Ok(orgs
            .get(org_id)
            .and_then(|versions| versions.get(&version))
            .cloned())
    }

    async fn install_dek(&self, dek: WrappedDek) -> OrgCryptoResult<()> {
        let mut orgs = self.orgs.write().await;
        let versions = orgs.entry(dek.org_id.clone()).or_default();
        let current = versions.keys().next_back().copied();
        check_next_version(&dek.org_id, current, dek.version)?;
        versions.insert(dek.version, dek);
        Ok(())
    }

    async fn retire_dek(&self, org_id: &str, version: u32) -> OrgCryptoResult<bool> {
        let mut orgs = self.orgs.write().await;
        Ok(orgs
            .get_mut(org_id)
            .is_some_and(|versions| versions.remove(&version).is_some()))
    }

    async fn retained_versions(&self, org_id: &str) -> OrgCryptoResult<Vec<u32>> {
        let orgs = self.orgs.read().await;
        Ok(orgs
            .get(org_id)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default())
    }
}
