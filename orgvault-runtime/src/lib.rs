//! Assembles the KMS client, key store, DEK cache, org crypto facade and
//! token vault from configuration.

mod config;
mod error;

pub use config::OrgVaultConfig;
pub use error::{RuntimeError, RuntimeResult};

use orgvault_keys::{
    DekCache, MemoryOrgKeyStore, OrgCrypto, OrgKeyLifecycle, OrgKeyStore,
};
use orgvault_kms::KmsProvider;
use orgvault_storage::OrgVaultDb;
use orgvault_tokens::{
    IntegrationHealth, MemoryTokenStore, OAuthProvider, TokenStore, TokenVault, check_account,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Installs the global `tracing` subscriber: `RUST_LOG` filter (default
/// `info`), written to stderr. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// A ready-to-use set of orgvault services.
#[derive(Clone)]
pub struct OrgVault {
    kms_provider: KmsProvider,
    crypto: OrgCrypto,
    tokens: TokenVault,
}

impl OrgVault {
    pub async fn from_env() -> RuntimeResult<Self> {
        Self::connect(&OrgVaultConfig::from_env()?).await
    }

    pub async fn connect(config: &OrgVaultConfig) -> RuntimeResult<Self> {
        let kms = orgvault_kms::connect(&config.kms).await?;

        let (keys, tokens): (Arc<dyn OrgKeyStore>, Arc<dyn TokenStore>) = match &config.db_path {
            Some(path) => {
                let db = OrgVaultDb::open(path)?;
                (Arc::new(db.key_store()), Arc::new(db.token_store()))
            }
            None => {
                warn!("ORGVAULT_DB_PATH not set, keys and tokens are kept in memory only");
                (
                    Arc::new(MemoryOrgKeyStore::new()),
                    Arc::new(MemoryTokenStore::new()),
                )
            }
        };

        let cache = DekCache::from_config(&config.crypto);
        info!(
            ttl_secs = cache.ttl().as_secs(),
            max_entries = cache.max_entries(),
            "org crypto ready"
        );

        let crypto = OrgCrypto::new(Arc::clone(&kms), keys, cache);
        let tokens = TokenVault::new(crypto.clone(), tokens);
        Ok(Self {
            kms_provider: kms.provider(),
            crypto,
            tokens,
        })
    }

    /// Which KMS backs this vault. The client itself stays internal.
    pub fn kms_provider(&self) -> KmsProvider {
        self.kms_provider
    }

    pub fn crypto(&self) -> &OrgCrypto {
        &self.crypto
    }

    pub fn tokens(&self) -> &TokenVault {
        &self.tokens
    }

    pub fn lifecycle(&self) -> OrgKeyLifecycle {
        self.crypto.lifecycle()
    }

    pub async fn integration_health(&self, org_id: &str, provider: OAuthProvider) -> IntegrationHealth {
        check_account(&self.tokens, org_id, provider).await
    }
}
