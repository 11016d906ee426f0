//! Content-addressed, time-expiring caches.
//!
//! Generation inputs (prompt strings, image descriptions) are reduced to a
//! SHA-256 [`fingerprint`] which keys a [`TtlCache`]. The same store type also
//! backs the resolved-preload table, keyed by preload key instead.

use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

/// Stable fingerprint (lowercase hex SHA-256) of generation input bytes.
pub fn fingerprint(input: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(input.as_ref()))
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory key/value store whose entries expire a fixed TTL after their last write.
///
/// All operations are synchronous and lock only the shard holding the key.
#[derive(Debug)]
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: DashMap<String, Entry<V>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache. `name` only appears in logs.
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Look up a live entry. Expired entries are dropped and reported absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }

        // Re-check expiry: a concurrent `set` may have refreshed the entry.
        if self
            .entries
            .remove_if(key, |_, entry| entry.expires_at <= now)
            .is_some()
        {
            debug!(cache = self.name, key = %key, "Cache entry expired");
        }
        None
    }

    /// Insert or overwrite an entry, restarting its expiry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key.into(), Entry { value, expires_at });
    }

    /// Whether a live entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, e)| e.value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(cache = self.name, purged, "Purged expired cache entries");
        }
        purged
    }

    /// Number of stored entries, including any not yet purged after expiry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
