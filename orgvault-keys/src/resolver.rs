//! Turns an organization id (and optionally a version) into its plaintext DEK.
//!
//! This module is private to the crate: raw DEKs leave it only as arguments
//! to the field cipher.

use crate::cache::DekCache;
use crate::error::{OrgCryptoError, OrgCryptoResult, from_kms};
use crate::store::{OrgKeyStore, WrappedDek};
use orgvault_crypto::DataKey;
use orgvault_kms::KmsClient;
use std::sync::Arc;
use tracing::{debug, warn};

/// The active DEK together with the version it was installed under.
pub(crate) struct ResolvedDek {
    pub version: u32,
    pub key: DataKey,
}

pub(crate) struct DekResolver {
    kms: Arc<dyn KmsClient>,
    store: Arc<dyn OrgKeyStore>,
    cache: DekCache,
}

impl DekResolver {
    pub(crate) fn new(kms: Arc<dyn KmsClient>, store: Arc<dyn OrgKeyStore>, cache: DekCache) -> Self {
        Self { kms, store, cache }
    }

    pub(crate) fn kms(&self) -> &Arc<dyn KmsClient> {
        &self.kms
    }

    pub(crate) fn store(&self) -> &Arc<dyn OrgKeyStore> {
        &self.store
    }

    pub(crate) fn cache(&self) -> &DekCache {
        &self.cache
    }

    /// Resolves the organization's active DEK.
    pub(crate) async fn get_dek(&self, org_id: &str) -> OrgCryptoResult<ResolvedDek> {
        let record = self
            .store
            .active_dek(org_id)
            .await?
            .ok_or_else(|| OrgCryptoError::dek_unavailable(org_id, "org has no DEK provisioned"))?;

        let version = record.version;
        if let Some(key) = self.cache.get(org_id, version).await {
            return Ok(ResolvedDek { version, key });
        }

        let key = self.unwrap_record(&record).await?;
        self.cache.insert(org_id, version, key.clone()).await;
        Ok(ResolvedDek { version, key })
    }

    /// Resolves a specific (possibly retained) DEK version.
    pub(crate) async fn get_dek_version(&self, org_id: &str, version: u32) -> OrgCryptoResult<DataKey> {
        if let Some(key) = self.cache.get(org_id, version).await {
            return Ok(key);
        }

        let Some(record) = self.store.dek_version(org_id, version).await? else {
            return Err(self.missing_version(org_id, version).await?);
        };

        let key = self.unwrap_record(&record).await?;
        self.cache.insert(org_id, version, key.clone()).await;
        Ok(key)
    }

    /// Error for a version the store does not hold. A version that was never
    /// issued (0, or above the active one) can only come from a corrupt blob
    /// header, so it fails the field rather than the org.
    async fn missing_version(&self, org_id: &str, version: u32) -> OrgCryptoResult<OrgCryptoError> {
        let active = self.store.active_dek(org_id).await?.map(|dek| dek.version);
        Ok(match active {
            Some(active) if version == 0 || version > active => OrgCryptoError::MalformedBlob(
                format!("blob names DEK version {version}, newer than active version {active}"),
            ),
            _ => OrgCryptoError::dek_unavailable(org_id, format!("DEK version {version} is not retained")),
        })
    }

    async fn unwrap_record(&self, record: &WrappedDek) -> OrgCryptoResult<DataKey> {
        let org_id = record.org_id.as_str();
        debug!(org_id, version = record.version, "DEK cache miss, unwrapping via KMS");

        let plaintext = self.kms.unwrap_key(&record.wrapped_key).await.map_err(|e| {
            warn!(org_id, version = record.version, "DEK unwrap failed: {e}");
            from_kms(org_id, e)
        })?;

        DataKey::from_slice(&plaintext).map_err(|e| {
            OrgCryptoError::dek_unavailable(org_id, format!("unwrapped DEK is unusable: {e}"))
        })
    }
}
