//! Plane cache for decoded, normalized planes.
//!
//! Decoding a plane is the most expensive engine call, and viewers tend to
//! revisit the same planes (scrubbing through Z or T and back). This module
//! keeps recently read planes in memory.
//!
//! # Cache Key
//!
//! Planes are cached by a composite key:
//! - Series index
//! - Resolution level the bytes were read at
//! - Linear plane index
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached planes in bytes and evicts
//! least-recently-used entries when the capacity is exceeded. A plane larger
//! than the whole capacity is never stored. A capacity of 0 disables caching.
//!
//! The cache is owned by a single reader and is not synchronized.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;

/// Default cache capacity: 256MB
pub const DEFAULT_PLANE_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => unreachable!(),
};

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for decoded planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneKey {
    /// Series index
    pub series: usize,

    /// Resolution level (0 = full resolution)
    pub resolution: usize,

    /// Linear plane index within the series
    pub plane: u32,
}

impl PlaneKey {
    pub fn new(series: usize, resolution: usize, plane: u32) -> Self {
        Self {
            series,
            resolution,
            plane,
        }
    }
}

// =============================================================================
// Plane Cache
// =============================================================================

/// LRU cache for normalized plane bytes with size-based capacity.
pub struct PlaneCache {
    cache: LruCache<PlaneKey, Bytes>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: usize,

    hits: u64,
    misses: u64,
}

impl PlaneCache {
    /// Create a new plane cache with default capacity (256MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PLANE_CACHE_CAPACITY)
    }

    /// Create a new plane cache with the specified capacity in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new plane cache with specified capacity and maximum entries.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: NonZeroUsize) -> Self {
        Self {
            cache: LruCache::new(max_entries),
            max_size,
            current_size: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Whether the cache stores anything at all.
    pub fn is_enabled(&self) -> bool {
        self.max_size > 0
    }

    /// Get a plane from the cache, marking it as recently used.
    pub fn get(&mut self, key: &PlaneKey) -> Option<Bytes> {
        match self.cache.get(key) {
            Some(data) => {
                self.hits += 1;
                Some(data.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Check if a plane is in the cache without updating LRU order.
    pub fn contains(&self, key: &PlaneKey) -> bool {
        self.cache.contains(key)
    }

    /// Store a plane in the cache.
    ///
    /// Planes larger than the capacity are ignored. Least-recently-used entries
    /// are evicted until the cache is within capacity.
    pub fn put(&mut self, key: PlaneKey, data: Bytes) {
        let data_size = data.len();
        if !self.is_enabled() || data_size > self.max_size {
            return;
        }

        if let Some(old_data) = self.cache.peek(&key) {
            self.current_size = self.current_size.saturating_sub(old_data.len());
        }

        // The entry bound may push out an LRU entry on its own
        if let Some((evicted_key, evicted)) = self.cache.push(key, data) {
            if evicted_key != key {
                self.current_size = self.current_size.saturating_sub(evicted.len());
            }
        }
        self.current_size += data_size;

        while self.current_size > self.max_size {
            match self.cache.pop_lru() {
                Some((_, evicted)) => {
                    self.current_size = self.current_size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_size = 0;
    }

    /// Get the current number of cached planes.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get the current total size of cached planes in bytes.
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Lookups that found a plane.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for PlaneCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
