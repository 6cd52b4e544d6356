//! In-process cache backend.
//!
//! DashMap entries carry an absolute expiry instant; expiry is enforced
//! on read and swept opportunistically on writes so dead entries don't
//! accumulate between reads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheBackend, CacheBackendError};

const SWEEP_EVERY_WRITES: u64 = 256;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
    write_count: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry
    pub fn sweep(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired entries are removed lazily on the read that observes them
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );

        if self.write_count.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY_WRITES == 0 {
            self.sweep();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheBackendError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheBackendError> {
        Ok(self
            .entries
            .iter()
            .filter(|kv| kv.key().starts_with(prefix) && !kv.value().is_expired())
            .map(|kv| kv.key().clone())
            .collect())
    }
}
