//! Batch decryption with per-item failure isolation.
//!
//! A page of emails or leads is decrypted as one batch. Each distinct DEK
//! version in the batch is resolved once (concurrently); each item then
//! succeeds or fails on its own, so one corrupted row never hides the rest.

use crate::error::{OrgCryptoError, OrgCryptoResult};
use crate::facade::OrgCrypto;
use futures::future::join_all;
use orgvault_crypto::{DataKey, EncryptedBlob, FieldContext, decrypt, decrypt_string};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Text shown in place of a field that could not be decrypted.
pub const DECRYPT_PLACEHOLDER: &str = "Could not decrypt";

/// One decrypted text field from a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Plain(String),
    Unreadable(OrgCryptoError),
}

impl FieldValue {
    /// The plaintext, or the placeholder for unreadable values.
    pub fn display(&self) -> &str {
        match self {
            FieldValue::Plain(text) => text,
            FieldValue::Unreadable(_) => DECRYPT_PLACEHOLDER,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, FieldValue::Plain(_))
    }

    pub fn into_option(self) -> Option<String> {
        match self {
            FieldValue::Plain(text) => Some(text),
            FieldValue::Unreadable(_) => None,
        }
    }
}

impl From<OrgCryptoResult<String>> for FieldValue {
    fn from(result: OrgCryptoResult<String>) -> Self {
        match result {
            Ok(text) => FieldValue::Plain(text),
            Err(e) => FieldValue::Unreadable(e),
        }
    }
}

impl OrgCrypto {
    /// Decrypts every blob independently. The output has one entry per input,
    /// in input order.
    pub async fn decrypt_batch(
        &self,
        org_id: &str,
        blobs: &[EncryptedBlob],
        context: FieldContext,
    ) -> Vec<OrgCryptoResult<Vec<u8>>> {
        let keys = self.resolve_versions(org_id, blobs).await;
        blobs
            .iter()
            .enumerate()
            .map(|(index, blob)| {
                let result = match keys.get(&blob.dek_version) {
                    Some(Ok(key)) => decrypt(key, blob, context).map_err(OrgCryptoError::from),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(OrgCryptoError::dek_unavailable(org_id, "version not resolved")),
                };
                if let Err(ref e) = result {
                    warn!(org_id, index, "batch item {context} failed: {e}");
                }
                result
            })
            .collect()
    }

    /// Text variant of [`decrypt_batch`](Self::decrypt_batch) for display.
    pub async fn decrypt_str_batch(
        &self,
        org_id: &str,
        blobs: &[EncryptedBlob],
        context: FieldContext,
    ) -> Vec<FieldValue> {
        let keys = self.resolve_versions(org_id, blobs).await;
        blobs
            .iter()
            .enumerate()
            .map(|(index, blob)| {
                let result = match keys.get(&blob.dek_version) {
                    Some(Ok(key)) => {
                        decrypt_string(key, blob, context).map_err(OrgCryptoError::from)
                    }
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(OrgCryptoError::dek_unavailable(org_id, "version not resolved")),
                };
                if let Err(ref e) = result {
                    warn!(org_id, index, "batch item {context} failed: {e}");
                }
                FieldValue::from(result)
            })
            .collect()
    }

    /// Resolves each distinct DEK version referenced by the batch once.
    async fn resolve_versions(
        &self,
        org_id: &str,
        blobs: &[EncryptedBlob],
    ) -> HashMap<u32, OrgCryptoResult<DataKey>> {
        let versions: BTreeSet<u32> = blobs.iter().map(|b| b.dek_version).collect();
        let lookups = versions.into_iter().map(|version| async move {
            (version, self.resolver.get_dek_version(org_id, version).await)
        });
        join_all(lookups).await.into_iter().collect()
    }
}
