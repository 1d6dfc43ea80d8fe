//! Shared fixtures: a counting KMS wrapper and a provisioned facade.

#![allow(dead_code)]

use async_trait::async_trait;
use orgvault_keys::{DekCache, MemoryOrgKeyStore, OrgCrypto};
use orgvault_kms::{GeneratedKey, KmsClient, KmsError, KmsProvider, KmsResult, LocalKmsClient};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use zeroize::Zeroizing;

/// Local KMS that counts calls and can simulate an outage.
pub struct CountingKms {
    inner: LocalKmsClient,
    unwraps: AtomicUsize,
    generates: AtomicUsize,
    outage: Mutex<Option<KmsError>>,
}

impl CountingKms {
    pub fn new() -> Self {
        Self {
            inner: LocalKmsClient::ephemeral("test-master"),
            unwraps: AtomicUsize::new(0),
            generates: AtomicUsize::new(0),
            outage: Mutex::new(None),
        }
    }

    pub fn unwrap_calls(&self) -> usize {
        self.unwraps.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generates.load(Ordering::SeqCst)
    }

    /// Every subsequent call fails with `err` until [`recover`](Self::recover).
    pub fn fail_with(&self, err: KmsError) {
        *self.outage.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.outage.lock().unwrap() = None;
    }

    fn check_outage(&self) -> KmsResult<()> {
        match self.outage.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KmsClient for CountingKms {
    fn provider(&self) -> KmsProvider {
        KmsProvider::Local
    }

    fn key_id(&self) -> &str {
        self.inner.key_id()
    }

    async fn wrap_key(&self, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        self.check_outage()?;
        self.inner.wrap_key(plaintext).await
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> KmsResult<Zeroizing<Vec<u8>>> {
        self.unwraps.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;
        self.inner.unwrap_key(wrapped).await
    }

    async fn generate_data_key(&self) -> KmsResult<GeneratedKey> {
        self.generates.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;
        self.inner.generate_data_key().await
    }
}

pub struct Harness {
    pub crypto: OrgCrypto,
    pub kms: Arc<CountingKms>,
    pub store: Arc<MemoryOrgKeyStore>,
}

impl Harness {
    /// A second facade over the same KMS and store with an empty cache, as a
    /// freshly started process would have.
    pub fn cold_facade(&self) -> OrgCrypto {
        self.facade_with_cache(DekCache::default())
    }

    pub fn facade_with_cache(&self, cache: DekCache) -> OrgCrypto {
        OrgCrypto::new(self.kms.clone(), self.store.clone(), cache)
    }
}

pub fn harness() -> Harness {
    let kms = Arc::new(CountingKms::new());
    let store = Arc::new(MemoryOrgKeyStore::new());
    let crypto = OrgCrypto::new(kms.clone(), store.clone(), DekCache::default());
    Harness { crypto, kms, store }
}

/// Harness with each org provisioned at version 1.
pub async fn provisioned(orgs: &[&str]) -> Harness {
    let h = harness();
    for org in orgs {
        h.crypto.lifecycle().provision_org(org).await.unwrap();
    }
    h
}
