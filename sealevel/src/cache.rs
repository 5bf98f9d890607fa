//! Encoded tile cache.
//!
//! [`TileCache`] maps a [`CacheKey`] to the PNG bytes produced for it. It is
//! created once at startup and lives for the rest of the process; entries are
//! never mutated after insert.
//!
//! The store is a [`moka::sync::Cache`]: lookups run concurrently, while
//! inserts and invalidations are applied under moka's internal write locks.
//!
//! # Bounded vs. unbounded
//!
//! - `TileCache::new(Some(n))` keeps at most `n` tiles, evicting the least
//!   valuable entries (moka's TinyLFU/LRU policy) once full.
//! - `TileCache::new(None)` never evicts. It grows by one entry per distinct
//!   key seen for the life of the process.

use std::time::SystemTime;

use bytes::Bytes;
use moka::sync::Cache;

use crate::key::CacheKey;

/// An encoded tile and when it was produced.
///
/// The timestamp is informational; nothing expires tiles by age.
#[derive(Debug, Clone)]
pub struct CachedTile {
    data: Bytes,
    created_at: SystemTime,
}

impl CachedTile {
    /// Wrap freshly encoded tile bytes, stamped with the current time.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            created_at: SystemTime::now(),
        }
    }

    /// The encoded PNG bytes. Cloning is cheap.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the entry, returning its bytes.
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// When the tile was generated.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// Process-lifetime store of encoded tiles.
pub struct TileCache {
    tiles: Cache<CacheKey, CachedTile>,
}

impl TileCache {
    /// Create a cache holding at most `max_capacity` tiles, or without any
    /// bound if `None`.
    pub fn new(max_capacity: Option<u64>) -> Self {
        let tiles = match max_capacity {
            Some(capacity) => Cache::builder().max_capacity(capacity).build(),
            None => Cache::builder().build(),
        };
        Self { tiles }
    }

    /// Look up a previously generated tile.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedTile> {
        self.tiles.get(key)
    }

    /// Store a tile. An existing entry for `key` is overwritten.
    pub fn insert(&self, key: CacheKey, tile: CachedTile) {
        self.tiles.insert(key, tile);
    }

    /// Remove one tile.
    pub fn invalidate(&self, key: &CacheKey) {
        self.tiles.invalidate(key);
    }

    /// Remove every tile.
    pub fn clear(&self) {
        self.tiles.invalidate_all();
        self.tiles.run_pending_tasks();
    }

    /// Number of tiles currently stored.
    ///
    /// Flushes moka's pending maintenance first so the count reflects every
    /// completed insert.
    pub fn entry_count(&self) -> u64 {
        self.tiles.run_pending_tasks();
        self.tiles.entry_count()
    }

    /// Maximum number of tiles, or `None` when unbounded.
    pub fn capacity(&self) -> Option<u64> {
        self.tiles.policy().max_capacity()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TileCoord;

    fn key(threshold: i32, x: u64) -> CacheKey {
        CacheKey::new(threshold, TileCoord::new(10, x, 7))
    }

    #[test]
    fn test_lookup_insert() {
        let cache = TileCache::new(Some(100));
        assert!(cache.lookup(&key(0, 1)).is_none());

        cache.insert(key(0, 1), CachedTile::new(Bytes::from_static(b"tile")));

        let tile = cache.lookup(&key(0, 1)).unwrap();
        assert_eq!(tile.data().as_ref(), b"tile");
        assert!(tile.created_at() <= SystemTime::now());
    }

    #[test]
    fn test_thresholds_are_distinct_entries() {
        let cache = TileCache::default();
        cache.insert(key(0, 1), CachedTile::new(Bytes::from_static(b"dry")));
        cache.insert(key(10, 1), CachedTile::new(Bytes::from_static(b"wet")));

        assert_eq!(cache.lookup(&key(0, 1)).unwrap().into_data(), "dry");
        assert_eq!(cache.lookup(&key(10, 1)).unwrap().into_data(), "wet");
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = TileCache::default();
        cache.insert(key(0, 1), CachedTile::new(Bytes::from_static(b"first")));
        cache.insert(key(0, 1), CachedTile::new(Bytes::from_static(b"second")));

        assert_eq!(cache.lookup(&key(0, 1)).unwrap().into_data(), "second");
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_unbounded_cache_grows_with_every_key() {
        // Without a capacity nothing is ever evicted; growth is expected.
        let cache = TileCache::new(None);
        assert_eq!(cache.capacity(), None);

        for x in 0..2_000 {
            cache.insert(key(0, x), CachedTile::new(Bytes::from_static(b"t")));
        }
        assert_eq!(cache.entry_count(), 2_000);
        assert!(cache.lookup(&key(0, 0)).is_some());
        assert!(cache.lookup(&key(0, 1_999)).is_some());
    }

    #[test]
    fn test_bounded_cache_evicts() {
        let cache = TileCache::new(Some(16));
        assert_eq!(cache.capacity(), Some(16));

        for x in 0..500 {
            cache.insert(key(0, x), CachedTile::new(Bytes::from_static(b"t")));
        }
        assert!(cache.entry_count() <= 16);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TileCache::default();
        cache.insert(key(0, 1), CachedTile::new(Bytes::from_static(b"a")));
        cache.insert(key(0, 2), CachedTile::new(Bytes::from_static(b"b")));

        cache.invalidate(&key(0, 1));
        assert!(cache.lookup(&key(0, 1)).is_none());
        assert!(cache.lookup(&key(0, 2)).is_some());

        cache.clear();
        assert!(cache.lookup(&key(0, 2)).is_none());
        assert_eq!(cache.entry_count(), 0);
    }
}
