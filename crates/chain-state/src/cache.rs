use alloy_primitives::B256;
use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};

/// Size limits for the three block caches (§3 "Chain block cache").
#[derive(Debug, Clone, Copy)]
pub struct BlockCacheLimits {
    /// Max entries in the *remoteBlocks* cache.
    pub remote_blocks: u32,
    /// Max entries in the *executedBlocks* cache.
    pub executed_blocks: u32,
    /// Max entries in the *invalidBlocks* cache.
    pub invalid_blocks: u32,
}

impl Default for BlockCacheLimits {
    fn default() -> Self {
        Self { remote_blocks: 256, executed_blocks: 256, invalid_blocks: 1024 }
    }
}

/// A size-bounded, hash-keyed LRU cache, used for the three caches named
/// in §3: blocks received but not yet canonical (*remoteBlocks*), blocks
/// successfully executed but not yet canonical (*executedBlocks*), and
/// blocks whose execution failed (*invalidBlocks*, keyed to the observed
/// error so repeated submissions short-circuit per §7).
#[derive(Debug)]
pub struct BoundedBlockCache<V> {
    inner: Mutex<LruMap<B256, V>>,
}

impl<V: Clone> BoundedBlockCache<V> {
    /// Creates a cache bounded to at most `capacity` entries.
    pub fn new(capacity: u32) -> Self {
        Self { inner: Mutex::new(LruMap::new(ByLength::new(capacity))) }
    }

    /// Inserts or refreshes `value` under `key`, evicting the
    /// least-recently-used entry if the cache is at capacity.
    pub fn insert(&self, key: B256, value: V) {
        self.inner.lock().insert(key, value);
    }

    /// Looks up `key` without affecting recency (a plain membership
    /// check/read, not a promotion).
    pub fn peek(&self, key: &B256) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    /// Looks up `key`, promoting it to most-recently-used.
    pub fn get(&self, key: &B256) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Removes `key` from the cache, returning its value if present.
    pub fn remove(&self, key: &B256) -> Option<V> {
        self.inner.lock().remove(key)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &B256) -> bool {
        self.inner.lock().peek(key).is_some()
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_past_capacity() {
        let cache = BoundedBlockCache::new(2);
        let a = B256::repeat_byte(1);
        let b = B256::repeat_byte(2);
        let c = B256::repeat_byte(3);

        cache.insert(a, 1u64);
        cache.insert(b, 2u64);
        cache.get(&a);
        cache.insert(c, 3u64);

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }
}
