//! The entry point application code uses to protect organization fields.

use crate::cache::DekCache;
use crate::error::OrgCryptoResult;
use crate::lifecycle::OrgKeyLifecycle;
use crate::resolver::DekResolver;
use crate::store::OrgKeyStore;
use orgvault_crypto::{EncryptedBlob, FieldContext, decrypt, decrypt_string, encrypt, encrypt_string};
use orgvault_kms::KmsClient;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Encrypts and decrypts fields under their organization's DEK.
///
/// Cheap to clone; clones share the KMS client, key store and DEK cache.
/// Apart from populating the cache, the facade has no side effects.
#[derive(Clone)]
pub struct OrgCrypto {
    pub(crate) resolver: Arc<DekResolver>,
}

impl OrgCrypto {
    pub fn new(kms: Arc<dyn KmsClient>, store: Arc<dyn OrgKeyStore>, cache: DekCache) -> Self {
        Self {
            resolver: Arc::new(DekResolver::new(kms, store, cache)),
        }
    }

    pub fn cache(&self) -> &DekCache {
        self.resolver.cache()
    }

    /// Provisioning, rotation and retirement of DEK versions, sharing this
    /// facade's KMS client, store and cache.
    pub fn lifecycle(&self) -> OrgKeyLifecycle {
        OrgKeyLifecycle::new(Arc::clone(&self.resolver))
    }

    /// Encrypts under the organization's active DEK and stamps its version
    /// into the blob.
    pub async fn encrypt_for_org(
        &self,
        org_id: &str,
        plaintext: &[u8],
        context: FieldContext,
    ) -> OrgCryptoResult<EncryptedBlob> {
        let dek = self.resolver.get_dek(org_id).await?;
        Ok(encrypt(&dek.key, dek.version, plaintext, context)?)
    }

    /// Decrypts with the DEK version recorded in the blob, so blobs written
    /// before a rotation stay readable while that version is retained.
    pub async fn decrypt_for_org(
        &self,
        org_id: &str,
        blob: &EncryptedBlob,
        context: FieldContext,
    ) -> OrgCryptoResult<Vec<u8>> {
        let key = self.resolver.get_dek_version(org_id, blob.dek_version).await?;
        Ok(decrypt(&key, blob, context)?)
    }

    pub async fn encrypt_str_for_org(
        &self,
        org_id: &str,
        plaintext: &str,
        context: FieldContext,
    ) -> OrgCryptoResult<EncryptedBlob> {
        let dek = self.resolver.get_dek(org_id).await?;
        Ok(encrypt_string(&dek.key, dek.version, plaintext, context)?)
    }

    pub async fn decrypt_str_for_org(
        &self,
        org_id: &str,
        blob: &EncryptedBlob,
        context: FieldContext,
    ) -> OrgCryptoResult<String> {
        let key = self.resolver.get_dek_version(org_id, blob.dek_version).await?;
        Ok(decrypt_string(&key, blob, context)?)
    }

    /// Re-seals a blob under the active DEK. Blobs already on the active
    /// version are re-sealed too (with a fresh nonce).
    pub async fn reencrypt_for_org(
        &self,
        org_id: &str,
        blob: &EncryptedBlob,
        context: FieldContext,
    ) -> OrgCryptoResult<EncryptedBlob> {
        let plaintext = Zeroizing::new(self.decrypt_for_org(org_id, blob, context).await?);
        let resealed = self.encrypt_for_org(org_id, &plaintext, context).await?;
        debug!(
            org_id,
            from_version = blob.dek_version,
            to_version = resealed.dek_version,
            "re-encrypted {context} blob"
        );
        Ok(resealed)
    }
}
