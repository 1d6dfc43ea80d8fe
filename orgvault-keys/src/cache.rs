//! Bounded, TTL-limited cache of unwrapped organization DEKs.
//!
//! Keyed by `(org_id, dek_version)` so blobs sealed under an older version
//! resolve independently of the active one. The cache is a plain value
//! injected into the facade; clones share the same map.

use crate::config::{MAX_DEK_CACHE_TTL_SECS, OrgCryptoConfig};
use orgvault_crypto::DataKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

type CacheKey = (String, u32);

struct CacheEntry {
    key: DataKey,
    inserted_at: Instant,
}

/// Thread-safe DEK cache shared by every clone.
#[derive(Clone)]
pub struct DekCache {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    ttl: Duration,
    max_entries: usize,
}

impl DekCache {
    /// `ttl` is clamped to the 30 minute maximum; `max_entries` is at least 1.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: ttl.min(Duration::from_secs(MAX_DEK_CACHE_TTL_SECS)),
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &OrgCryptoConfig) -> Self {
        Self::new(config.cache_ttl(), config.dek_cache_max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn is_live(&self, entry: &CacheEntry) -> bool {
        entry.inserted_at.elapsed() < self.ttl
    }

    /// Returns a live key. Expired entries are never returned.
    pub(crate) async fn get(&self, org_id: &str, version: u32) -> Option<DataKey> {
        let entries = self.entries.read().await;
        entries
            .get(&(org_id.to_string(), version))
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.key.clone())
    }

    /// Stores a key. Concurrent inserts for the same slot are last-writer-wins.
    pub(crate) async fn insert(&self, org_id: &str, version: u32, key: DataKey) {
        let slot = (org_id.to_string(), version);
        let mut entries = self.entries.write().await;

        if !entries.contains_key(&slot) && entries.len() >= self.max_entries {
            let before = entries.len();
            entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
            debug!("DEK cache full, evicted {} entries", before - entries.len());
        }

        entries.insert(
            slot,
            CacheEntry {
                key,
                inserted_at: Instant::now(),
            },
        );
    }

    /// True when a live key is cached for the slot.
    pub async fn contains(&self, org_id: &str, version: u32) -> bool {
        self.get(org_id, version).await.is_some()
    }

    /// Drops one cached version. Returns whether anything was removed.
    pub async fn invalidate(&self, org_id: &str, version: u32) -> bool {
        self.entries
            .write()
            .await
            .remove(&(org_id.to_string(), version))
            .is_some()
    }

    /// Drops every cached version for an organization.
    pub async fn invalidate_org(&self, org_id: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(org, _), _| org != org_id);
        before - entries.len()
    }

    /// Removes expired entries and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| self.is_live(entry))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for DekCache {
    fn default() -> Self {
        Self::from_config(&OrgCryptoConfig::default())
    }
}
