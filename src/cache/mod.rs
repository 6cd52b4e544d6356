//! Best-effort TTL cache fronting read-heavy booking-platform entities.
//!
//! The cache is never authoritative: absence always falls back to the
//! ledger, and every operation is defined to be safe when the backend is
//! unreachable (reads return absent, writes are no-ops). Callers never
//! branch on connectivity themselves.

pub mod keys;
pub mod memory;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;

#[derive(Error, Debug)]
pub enum CacheBackendError {
    #[error("cache backend unreachable: {0}")]
    Unreachable(String),

    #[error("cache backend timed out")]
    Timeout,
}

/// Key/value backend with per-key TTL and prefix enumeration.
///
/// Pattern deletion is built on `keys_with_prefix` + `delete`: if the
/// backend cannot delete a pattern atomically, enumerate-then-delete is
/// used and the small race window is bounded by the entity-class TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError>;
    async fn set(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), CacheBackendError>;
    async fn delete(&self, key: &str) -> Result<(), CacheBackendError>;
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheBackendError>;
}

/// Read-through cache store.
///
/// All methods are infallible from the caller's point of view; backend
/// failures degrade to "no value" / no-op and are absorbed by logging.
/// Connectivity transitions are logged once per edge.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    catalog_ttl: Duration,
    per_user_ttl: Duration,
    connected: AtomicBool,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            catalog_ttl: Duration::from_secs(config.catalog_ttl_secs),
            per_user_ttl: Duration::from_secs(config.per_user_ttl_secs),
            connected: AtomicBool::new(true),
        }
    }

    /// TTL for catalog-class entries (services, staff list, public reviews)
    pub fn catalog_ttl(&self) -> Duration {
        self.catalog_ttl
    }

    /// TTL for per-user entries (profile, bookings)
    pub fn per_user_ttl(&self) -> Duration {
        self.per_user_ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => {
                self.note_reachable();
                match serde_json::from_str(&raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        // A corrupt entry is as good as a miss; drop it
                        warn!(key = %key, error = %e, "Evicting undeserializable cache entry");
                        let _ = self.backend.delete(key).await;
                        None
                    }
                }
            }
            Ok(None) => {
                self.note_reachable();
                None
            }
            Err(e) => {
                self.note_unreachable(&e);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache value");
                return;
            }
        };

        match self.backend.set(key, raw, ttl).await {
            Ok(()) => self.note_reachable(),
            Err(e) => self.note_unreachable(&e),
        }
    }

    pub async fn delete(&self, key: &str) {
        match self.backend.delete(key).await {
            Ok(()) => {
                self.note_reachable();
                debug!(key = %key, "Cache entry invalidated");
            }
            Err(e) => self.note_unreachable(&e),
        }
    }

    /// Cascading invalidation: enumerate matching keys, then delete each.
    pub async fn delete_by_prefix(&self, prefix: &str) {
        let keys = match self.backend.keys_with_prefix(prefix).await {
            Ok(keys) => {
                self.note_reachable();
                keys
            }
            Err(e) => {
                self.note_unreachable(&e);
                return;
            }
        };

        let count = keys.len();
        for key in keys {
            if let Err(e) = self.backend.delete(&key).await {
                self.note_unreachable(&e);
                return;
            }
        }

        if count > 0 {
            debug!(prefix = %prefix, count, "Cache entries invalidated by prefix");
        }
    }

    fn note_reachable(&self) {
        if !self.connected.swap(true, Ordering::Relaxed) {
            info!("Cache backend reachable again");
        }
    }

    fn note_unreachable(&self, e: &CacheBackendError) {
        if self.connected.swap(false, Ordering::Relaxed) {
            warn!(error = %e, "Cache backend unreachable, degrading to pass-through");
        }
    }
}
