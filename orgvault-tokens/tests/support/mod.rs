//! Vault fixtures over a local KMS that can be switched into an outage.

#![allow(dead_code)]

use async_trait::async_trait;
use orgvault_keys::{DekCache, MemoryOrgKeyStore, OrgCrypto};
use orgvault_kms::{KmsClient, KmsError, KmsProvider, KmsResult, LocalKmsClient};
use orgvault_tokens::{MemoryTokenStore, TokenVault};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroizing;

pub const ORG: &str = "org-x";

pub struct FlakyKms {
    inner: LocalKmsClient,
    down: AtomicBool,
}

impl FlakyKms {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> KmsResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(KmsError::Unavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KmsClient for FlakyKms {
    fn provider(&self) -> KmsProvider {
        KmsProvider::Local
    }

    fn key_id(&self) -> &str {
        self.inner.key_id()
    }

    async fn wrap_key(&self, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        self.check()?;
        self.inner.wrap_key(plaintext).await
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> KmsResult<Zeroizing<Vec<u8>>> {
        self.check()?;
        self.inner.unwrap_key(wrapped).await
    }
}

pub struct Fixture {
    pub vault: TokenVault,
    pub crypto: OrgCrypto,
    pub tokens: Arc<MemoryTokenStore>,
    pub keys: Arc<MemoryOrgKeyStore>,
    pub kms: Arc<FlakyKms>,
}

impl Fixture {
    /// A vault over the same stores whose DEK cache starts empty.
    pub fn cold_vault(&self) -> TokenVault {
        let crypto = OrgCrypto::new(self.kms.clone(), self.keys.clone(), DekCache::default());
        TokenVault::new(crypto, self.tokens.clone())
    }
}

/// Vault with [`ORG`] provisioned.
pub async fn fixture() -> Fixture {
    let kms = Arc::new(FlakyKms {
        inner: LocalKmsClient::ephemeral("token-tests"),
        down: AtomicBool::new(false),
    });
    let keys = Arc::new(MemoryOrgKeyStore::new());
    let tokens = Arc::new(MemoryTokenStore::new());
    let crypto = OrgCrypto::new(kms.clone(), keys.clone(), DekCache::default());
    crypto.lifecycle().provision_org(ORG).await.unwrap();

    Fixture {
        vault: TokenVault::new(crypto.clone(), tokens.clone()),
        crypto,
        tokens,
        keys,
        kms,
    }
}
