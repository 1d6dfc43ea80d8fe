//! Org crypto configuration.

use crate::error::{OrgCryptoError, OrgCryptoResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Default DEK cache TTL (5 minutes).
pub const DEFAULT_DEK_CACHE_TTL_SECS: u64 = 300;

/// Upper bound on the DEK cache TTL (30 minutes).
pub const MAX_DEK_CACHE_TTL_SECS: u64 = 1800;

pub const DEFAULT_DEK_CACHE_MAX_ENTRIES: usize = 10_000;

/// Configuration for the DEK cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgCryptoConfig {
    /// How long an unwrapped DEK stays in memory. Clamped to
    /// [`MAX_DEK_CACHE_TTL_SECS`].
    pub dek_cache_ttl_secs: u64,

    /// Maximum cached `(org, version)` keys.
    pub dek_cache_max_entries: usize,
}

impl Default for OrgCryptoConfig {
    fn default() -> Self {
        Self {
            dek_cache_ttl_secs: DEFAULT_DEK_CACHE_TTL_SECS,
            dek_cache_max_entries: DEFAULT_DEK_CACHE_MAX_ENTRIES,
        }
    }
}

impl OrgCryptoConfig {
    /// Reads `DEK_CACHE_TTL_SECS` and `DEK_CACHE_MAX_ENTRIES`.
    pub fn from_env() -> OrgCryptoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> OrgCryptoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("DEK_CACHE_TTL_SECS").filter(|v| !v.trim().is_empty()) {
            config.dek_cache_ttl_secs = raw.trim().parse().map_err(|_| {
                OrgCryptoError::Config(format!("DEK_CACHE_TTL_SECS is not a number: {raw:?}"))
            })?;
        }
        if config.dek_cache_ttl_secs > MAX_DEK_CACHE_TTL_SECS {
            warn!(
                "DEK_CACHE_TTL_SECS={} exceeds the maximum, using {MAX_DEK_CACHE_TTL_SECS}",
                config.dek_cache_ttl_secs
            );
            config.dek_cache_ttl_secs = MAX_DEK_CACHE_TTL_SECS;
        }

        if let Some(raw) = lookup("DEK_CACHE_MAX_ENTRIES").filter(|v| !v.trim().is_empty()) {
            config.dek_cache_max_entries = match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(OrgCryptoError::Config(format!(
                        "DEK_CACHE_MAX_ENTRIES must be a positive integer: {raw:?}"
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Effective TTL after clamping.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dek_cache_ttl_secs.min(MAX_DEK_CACHE_TTL_SECS))
    }
}
