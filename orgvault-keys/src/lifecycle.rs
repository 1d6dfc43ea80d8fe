//! Provisioning, rotation and retirement of organization DEKs.

use crate::error::{OrgCryptoError, OrgCryptoResult, from_kms};
use crate::resolver::DekResolver;
use crate::store::WrappedDek;
use orgvault_crypto::DataKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Result of a successful rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationOutcome {
    pub old_version: u32,
    pub new_version: u32,
}

/// Manages the DEK versions of organizations.
///
/// Obtained from [`OrgCrypto::lifecycle`](crate::OrgCrypto::lifecycle) so it
/// shares the facade's cache: new keys are seeded into it and retired
/// versions are dropped from it.
#[derive(Clone)]
pub struct OrgKeyLifecycle {
    resolver: Arc<DekResolver>,
}

impl OrgKeyLifecycle {
    pub(crate) fn new(resolver: Arc<DekResolver>) -> Self {
        Self { resolver }
    }

    /// Creates version 1 of the organization's DEK.
    pub async fn provision_org(&self, org_id: &str) -> OrgCryptoResult<u32> {
        if self.resolver.store().active_dek(org_id).await?.is_some() {
            return Err(OrgCryptoError::AlreadyProvisioned(org_id.to_string()));
        }

        match self.install_new_version(org_id, 1).await {
            Err(OrgCryptoError::VersionConflict { .. }) => {
                Err(OrgCryptoError::AlreadyProvisioned(org_id.to_string()))
            }
            Err(e) => Err(e),
            Ok(()) => {
                info!(org_id, version = 1, "provisioned org DEK");
                Ok(1)
            }
        }
    }

    /// Installs a new active DEK version. Older versions stay retained, so
    /// existing blobs remain decryptable until they are re-encrypted.
    ///
    /// Concurrent rotations of the same organization race on the store; the
    /// loser gets `VersionConflict`.
    pub async fn rotate_dek(&self, org_id: &str) -> OrgCryptoResult<RotationOutcome> {
        let current = self
            .resolver
            .store()
            .active_dek(org_id)
            .await?
            .ok_or_else(|| OrgCryptoError::dek_unavailable(org_id, "org has no DEK to rotate"))?;

        let new_version =
            current
                .version
                .checked_add(1)
                .ok_or_else(|| OrgCryptoError::InvalidVersion {
                    org_id: org_id.to_string(),
                    version: current.version,
                    reason: "DEK version space exhausted".to_string(),
                })?;
        let outcome = RotationOutcome {
            old_version: current.version,
            new_version,
        };
        self.install_new_version(org_id, outcome.new_version).await?;

        info!(
            org_id,
            old_version = outcome.old_version,
            new_version = outcome.new_version,
            "rotated org DEK"
        );
        Ok(outcome)
    }

    /// Deletes a retained version. Blobs still sealed under it become
    /// permanently `DekUnavailable`.
    pub async fn retire_version(&self, org_id: &str, version: u32) -> OrgCryptoResult<()> {
        let invalid = |reason: &str| OrgCryptoError::InvalidVersion {
            org_id: org_id.to_string(),
            version,
            reason: reason.to_string(),
        };

        let active = self
            .resolver
            .store()
            .active_dek(org_id)
            .await?
            .ok_or_else(|| OrgCryptoError::dek_unavailable(org_id, "org has no DEK provisioned"))?;
        if version == active.version {
            return Err(invalid("the active version cannot be retired"));
        }

        if !self.resolver.store().retire_dek(org_id, version).await? {
            return Err(invalid("version is not retained"));
        }
        self.resolver.cache().invalidate(org_id, version).await;

        info!(org_id, version, "retired org DEK version");
        Ok(())
    }

    pub async fn retained_versions(&self, org_id: &str) -> OrgCryptoResult<Vec<u32>> {
        self.resolver.store().retained_versions(org_id).await
    }

    pub async fn active_version(&self, org_id: &str) -> OrgCryptoResult<Option<u32>> {
        Ok(self
            .resolver
            .store()
            .active_dek(org_id)
            .await?
            .map(|dek| dek.version))
    }

    async fn install_new_version(&self, org_id: &str, version: u32) -> OrgCryptoResult<()> {
        let generated = self
            .resolver
            .kms()
            .generate_data_key()
            .await
            .map_err(|e| from_kms(org_id, e))?;
        let key = DataKey::from_slice(&generated.plaintext)
            .map_err(|e| OrgCryptoError::Encryption(format!("KMS generated an unusable key: {e}")))?;

        self.resolver
            .store()
            .install_dek(WrappedDek::new(org_id, version, generated.wrapped))
            .await?;
        self.resolver.cache().insert(org_id, version, key).await;
        Ok(())
    }
}
