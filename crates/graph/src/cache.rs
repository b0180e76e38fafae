use lru::LruCache;
use std::borrow::Borrow;
use std::hash::Hash;

/// Size-capped memo of derived results with recency refreshed on every read.
///
/// The bound is supplied per `set` call so one cache can follow a config reload
/// without being rebuilt.
pub struct NeighborhoodCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq, V> NeighborhoodCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
        }
    }

    /// Returns the value and marks it most-recently-used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    /// Insert or overwrite, then evict oldest entries until `len <= max_size`.
    /// Returns how many entries were evicted.
    pub fn set(&mut self, key: K, value: V, max_size: usize) -> usize {
        self.entries.put(key, value);
        let mut evicted = 0;
        while self.entries.len() > max_size {
            if self.entries.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            log::debug!("Neighborhood cache evicted {evicted} entries (max {max_size})");
        }
        evicted
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Hash + Eq, V> Default for NeighborhoodCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
