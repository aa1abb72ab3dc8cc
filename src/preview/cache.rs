//! Bounded in-memory image cache for the display layer.
//!
//! - LRU ordering with an entry-count cap (default 100)
//! - Cost cap on estimated decoded size (default 100 MB)
//!
//! Keys are xxhash digests of the photo's provenance key.

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

/// Default number of cached images.
pub const DEFAULT_CAPACITY: usize = 100;

/// Default cost limit in bytes.
pub const DEFAULT_MAX_BYTES: usize = 100 * 1024 * 1024;

/// Estimated bytes per pixel for RGBA images.
const BYTES_PER_PIXEL: usize = 4;

/// Bump when the meaning of cached entries changes.
const CACHE_VERSION: u8 = 1;

/// A cached image and its estimated cost.
#[derive(Clone)]
pub struct CachedImage {
    pub image: Arc<DynamicImage>,
    pub width: u32,
    pub height: u32,
    pub memory_bytes: usize,
}

impl CachedImage {
    fn new(image: Arc<DynamicImage>) -> Self {
        let (width, height) = image.dimensions();
        let memory_bytes = (width as usize) * (height as usize) * BYTES_PER_PIXEL;
        Self {
            image,
            width,
            height,
            memory_bytes,
        }
    }
}

/// Cache key for image lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(key: &str) -> Self {
        let mut data = Vec::with_capacity(key.len() + 1);
        data.push(CACHE_VERSION);
        data.extend_from_slice(key.as_bytes());
        Self(xxh3_64(&data))
    }
}

/// Image cache shared by clones.
#[derive(Clone)]
pub struct ImageCache {
    max_bytes: usize,
    current_bytes: Arc<RwLock<usize>>,
    entries: Arc<RwLock<LruCache<CacheKey, CachedImage>>>,
}

impl ImageCache {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        debug!(capacity, max_bytes, "Initialized image cache");
        Self {
            max_bytes,
            current_bytes: Arc::new(RwLock::new(0)),
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedImage> {
        self.entries.write().get(key).cloned()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains(key)
    }

    /// Insert an image, evicting least recently used entries as needed.
    ///
    /// Images larger than the whole cost limit are not cached; returns false.
    pub fn insert(&self, key: CacheKey, image: Arc<DynamicImage>) -> bool {
        let cached = CachedImage::new(image);
        let new_size = cached.memory_bytes;
        if new_size > self.max_bytes {
            trace!(new_size, max = self.max_bytes, "Image too large to cache");
            return false;
        }

        let mut entries = self.entries.write();
        let mut current = self.current_bytes.write();

        if let Some(old) = entries.pop(&key) {
            *current = current.saturating_sub(old.memory_bytes);
        }

        while *current + new_size > self.max_bytes {
            match entries.pop_lru() {
                Some((_, evicted)) => {
                    *current = current.saturating_sub(evicted.memory_bytes);
                    trace!(
                        evicted_bytes = evicted.memory_bytes,
                        current_bytes = *current,
                        "Evicted image from cache"
                    );
                }
                None => break,
            }
        }

        // `push` evicts the LRU entry when the count limit is reached.
        if let Some((_, evicted)) = entries.push(key, cached) {
            *current = current.saturating_sub(evicted.memory_bytes);
        }
        *current += new_size;
        true
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        match self.entries.write().pop(key) {
            Some(evicted) => {
                let mut current = self.current_bytes.write();
                *current = current.saturating_sub(evicted.memory_bytes);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_usage(&self) -> usize {
        *self.current_bytes.read()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAX_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgba8(width, height))
    }

    #[test]
    fn test_cache_key_hash() {
        let key1 = CacheKey::new("remote:https://images.example/a.jpg");
        let key2 = CacheKey::new("remote:https://images.example/a.jpg");
        let key3 = CacheKey::new("remote:https://images.example/b.jpg");
        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ImageCache::default();
        let key = CacheKey::new("a");
        assert!(cache.insert(key, image(10, 10)));
        let cached = cache.get(&key).unwrap();
        assert_eq!((cached.width, cached.height), (10, 10));
        assert_eq!(cache.memory_usage(), 400);

        // Replacing an entry does not double count.
        assert!(cache.insert(key, image(5, 5)));
        assert_eq!(cache.memory_usage(), 100);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_count_limit_evicts_lru() {
        let cache = ImageCache::new(2, DEFAULT_MAX_BYTES);
        let (a, b, c) = (CacheKey::new("a"), CacheKey::new("b"), CacheKey::new("c"));
        cache.insert(a, image(1, 1));
        cache.insert(b, image(1, 1));
        // Touch `a` so `b` is least recently used.
        cache.get(&a);
        cache.insert(c, image(1, 1));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.memory_usage(), 8);
    }

    #[test]
    fn test_cost_limit_evicts_lru() {
        // Room for two 10x10 RGBA images.
        let cache = ImageCache::new(100, 800);
        let keys: Vec<CacheKey> = ["a", "b", "c"].iter().map(|k| CacheKey::new(k)).collect();
        for key in &keys {
            cache.insert(*key, image(10, 10));
        }

        assert!(!cache.contains(&keys[0]));
        assert!(cache.contains(&keys[1]));
        assert!(cache.contains(&keys[2]));
        assert_eq!(cache.memory_usage(), 800);
    }

    #[test]
    fn test_oversized_image_is_not_cached() {
        let cache = ImageCache::new(10, 100);
        assert!(!cache.insert(CacheKey::new("big"), image(10, 10)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove() {
        let cache = ImageCache::default();
        let key = CacheKey::new("a");
        cache.insert(key, image(2, 2));
        assert!(cache.remove(&key));
        assert!(!cache.remove(&key));
        assert_eq!(cache.memory_usage(), 0);
        assert!(cache.is_empty());
    }
}
