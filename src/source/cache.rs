//! In-memory store for produced documents, so one tool's output can feed the next

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A cached output: the bytes plus the file name they were delivered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_name: String,
    pub data: Vec<u8>,
}

struct CacheInner {
    lru: LruCache<String, CacheEntry>,
    total_bytes: usize,
}

/// Cache manager for output documents with entry count and byte budget limits
pub struct CacheManager {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl CacheManager {
    /// Create a new cache manager with the specified entry capacity and byte budget
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store an output in the cache.
    ///
    /// Entries larger than the whole byte budget are dropped and `false` is
    /// returned. Otherwise least-recently-used entries are evicted until the
    /// new entry fits.
    pub fn put(&self, key: String, file_name: impl Into<String>, data: Vec<u8>) -> bool {
        let new_size = data.len();

        if new_size > self.max_bytes {
            tracing::debug!(key = %key, size = new_size, "output exceeds cache budget, not cached");
            return false;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.data.len());
        }

        while inner.total_bytes + new_size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((evicted_key, evicted)) => {
                    tracing::debug!(key = %evicted_key, "evicted cached output");
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.data.len());
                }
                None => break,
            }
        }

        // A capacity eviction happens inside `push`, account for it too.
        let entry = CacheEntry {
            file_name: file_name.into(),
            data,
        };
        if let Some((evicted_key, evicted)) = inner.lru.push(key.clone(), entry) {
            if evicted_key != key {
                inner.total_bytes = inner.total_bytes.saturating_sub(evicted.data.len());
            }
        }
        inner.total_bytes += new_size;
        true
    }

    /// Get a cached output
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.lock().lru.get(key).cloned()
    }

    /// Check if a key exists in the cache
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Get total bytes currently stored in cache
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Generate a new cache key that does not collide with existing keys.
    pub fn generate_unique_key(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                return key;
            }
        }
    }
}
