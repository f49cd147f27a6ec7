// src/shared.rs
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{LruTtlCache, Payload};

/// Cloneable handle to the one cache instance shared by every worker.
///
/// All access goes through a single mutex. Each method holds it for exactly
/// one cache call, so no I/O ever runs inside the critical section. A
/// miss-load-insert sequence built from these calls is therefore not atomic:
/// two workers may both miss and both insert the same key, and the last write
/// wins.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<LruTtlCache>>,
}

impl SharedCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::from_cache(LruTtlCache::new(capacity, ttl))
    }

    pub fn from_cache(cache: LruTtlCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Payload> {
        self.inner.lock().get(key)
    }

    pub fn get_or_delete_expired(&self, key: &str) -> Option<Payload> {
        self.inner.lock().get_or_delete_expired(key)
    }

    pub fn put(&self, key: &str, payload: impl Into<Payload>) {
        // Convert before locking so a Vec -> Arc copy stays outside the lock.
        let payload = payload.into();
        self.inner.lock().put(key, payload);
    }

    pub fn remove(&self, key: &str) -> Option<Payload> {
        self.inner.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Run `f` with the cache locked, for sequences that must be serialized
    /// together. Keep `f` free of I/O.
    pub fn with<R>(&self, f: impl FnOnce(&mut LruTtlCache) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl std::fmt::Debug for SharedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.inner.lock(), f)
    }
}
