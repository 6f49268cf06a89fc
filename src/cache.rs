//! Bounded content-addressed embedding cache

use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ContextError, Result};

/// Default maximum number of cached embeddings
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1000;

type Key = [u8; 32];

struct CacheInner {
    entries: HashMap<Key, Arc<Vec<f32>>>,
    /// First-write insertion order, front = oldest
    order: VecDeque<Key>,
}

/// Concurrent embedding cache keyed by the SHA-256 digest of the text
///
/// Eviction is FIFO on first-write insertion order, not LRU: reads and
/// re-stores never touch an entry's position. Re-storing an existing
/// key is a no-op (first-writer wins). Empty or whitespace-only texts
/// and empty vectors are silently ignored; the cache has no error
/// channel of its own.
pub struct EmbeddingCache {
    inner: RwLock<CacheInner>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl EmbeddingCache {
    /// Create a cache holding at most `max_size` embeddings
    pub fn new(max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(ContextError::InvalidArgument(
                "cache size must be positive".to_string(),
            ));
        }

        Ok(Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Compute the content key for a text
    fn digest(text: &str) -> Key {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.finalize().into()
    }

    /// Look up the embedding cached for `text`, if any
    pub fn try_get(&self, text: &str) -> Option<Arc<Vec<f32>>> {
        if text.trim().is_empty() {
            return None;
        }

        let key = Self::digest(text);
        let found = self.inner.read().entries.get(&key).cloned();

        match &found {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Embedding cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Embedding cache miss");
            }
        }
        found
    }

    /// Store an embedding for `text`, evicting oldest entries if full
    ///
    /// Invalid inputs are ignored. After any completed store the entry
    /// count never exceeds `max_size`.
    pub fn store(&self, text: &str, embedding: Vec<f32>) {
        if text.trim().is_empty() || embedding.is_empty() {
            return;
        }

        let key = Self::digest(text);
        let mut inner = self.inner.write();

        // First-writer wins: an existing key keeps its value and its
        // position in the eviction order.
        if inner.entries.contains_key(&key) {
            return;
        }

        while inner.entries.len() >= self.max_size {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!("Evicted oldest cached embedding");
            } else {
                break;
            }
        }

        inner.entries.insert(key, Arc::new(embedding));
        inner.order.push_back(key);
    }

    /// Remove all cached embeddings
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
        debug!("Cleared embedding cache");
    }

    /// Number of cached embeddings
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity bound
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_size: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(seed: f32) -> Vec<f32> {
        vec![seed, seed + 1.0, seed + 2.0]
    }

    #[test]
    fn test_store_and_get() {
        let cache = EmbeddingCache::new(10).unwrap();

        assert!(cache.try_get("hello").is_none());
        cache.store("hello", vector(1.0));

        let cached = cache.try_get("hello").unwrap();
        assert_eq!(*cached, vector(1.0));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_invalid_inputs_ignored() {
        let cache = EmbeddingCache::new(10).unwrap();

        cache.store("", vector(1.0));
        cache.store("   \t\n", vector(1.0));
        cache.store("ok", vec![]);

        assert!(cache.is_empty());
        assert!(cache.try_get("").is_none());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(EmbeddingCache::new(0).is_err());
    }

    #[test]
    fn test_fifo_eviction_order() {
        let cache = EmbeddingCache::new(5).unwrap();
        for i in 0..5 {
            cache.store(&format!("t_{i}"), vector(i as f32));
        }
        assert_eq!(cache.len(), 5);

        cache.store("t_5", vector(5.0));

        assert!(cache.len() <= 5);
        assert!(cache.try_get("t_5").is_some());
        // The earliest insertion is the one evicted.
        assert!(cache.try_get("t_0").is_none());
        for i in 1..5 {
            assert!(cache.try_get(&format!("t_{i}")).is_some());
        }
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = EmbeddingCache::new(3).unwrap();
        cache.store("key", vector(1.0));
        cache.store("key", vector(9.0));

        assert_eq!(cache.len(), 1);
        assert_eq!(*cache.try_get("key").unwrap(), vector(1.0));
    }

    #[test]
    fn test_restore_does_not_touch_order() {
        let cache = EmbeddingCache::new(2).unwrap();
        cache.store("a", vector(1.0));
        cache.store("b", vector(2.0));
        // Re-store "a"; it must keep its original (oldest) position.
        cache.store("a", vector(3.0));
        cache.store("c", vector(4.0));

        assert!(cache.try_get("a").is_none());
        assert!(cache.try_get("b").is_some());
        assert!(cache.try_get("c").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = EmbeddingCache::new(4).unwrap();
        cache.store("a", vector(1.0));
        cache.store("b", vector(2.0));
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.try_get("a").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_store_holds_size_invariant() {
        let cache = Arc::new(EmbeddingCache::new(8).unwrap());

        let mut handles = Vec::new();
        for worker in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    cache.store(&format!("w{worker}-{i}"), vector(i as f32));
                    let _ = cache.try_get(&format!("w{worker}-{i}"));
                    assert!(cache.len() <= cache.max_size());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.len() <= 8);
    }
}
