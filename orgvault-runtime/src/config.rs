use crate::error::RuntimeResult;
use orgvault_keys::OrgCryptoConfig;
use orgvault_kms::KmsConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything needed to assemble an [`OrgVault`](crate::OrgVault).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrgVaultConfig {
    pub kms: KmsConfig,
    pub crypto: OrgCryptoConfig,
    /// DuckDB file for wrapped DEKs and tokens. `None` keeps both in memory.
    pub db_path: Option<PathBuf>,
}

impl OrgVaultConfig {
    pub fn from_env() -> RuntimeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the `KMS_*` and `DEK_CACHE_*` variables plus `ORGVAULT_DB_PATH`.
    pub fn from_lookup<F>(lookup: F) -> RuntimeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            kms: KmsConfig::from_lookup(&lookup)?,
            crypto: OrgCryptoConfig::from_lookup(&lookup)?,
            db_path: lookup("ORGVAULT_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}
