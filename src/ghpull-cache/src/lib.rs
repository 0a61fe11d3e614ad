//! Caching utilities for ghpull.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Simple in-memory LRU cache.
pub struct LruCache<K, V> {
    capacity: usize,
    items: HashMap<K, V>,
    order: Vec<K>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.items.contains_key(key) {
            self.order.retain(|k| k != key);
            self.order.push(key.clone());
            self.items.get(key)
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if self.items.len() >= self.capacity
            && !self.items.contains_key(&key)
            && let Some(oldest) = self.order.first().cloned()
        {
            self.items.remove(&oldest);
            self.order.remove(0);
        }

        self.order.retain(|k| k != &key);
        self.order.push(key.clone());
        self.items.insert(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.order.retain(|k| k != key);
        self.items.remove(key)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Thread-safe LRU cache whose entries expire after a fixed time-to-live.
///
/// Lookups never block on I/O and a miss is always safe: callers treat this
/// purely as a shortcut around repeated requests.
pub struct ExpiringCache<K, V> {
    ttl: Duration,
    inner: Mutex<LruCache<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> ExpiringCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Time-to-live applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a clone of the value if present and not yet expired.
    ///
    /// Expired entries are evicted on access.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.remove(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of stored entries, including ones that expired but were not
    /// accessed since.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
