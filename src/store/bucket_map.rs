//! Concurrent two-level keyed map (bucket → key → value).

use std::collections::BTreeMap;

use parking_lot::RwLock;

type Bucket<V> = BTreeMap<String, V>;

/// Two-level map with ordinal ordering at both levels.
///
/// Buckets appear on the first insert and stay until [`clear`](Self::clear),
/// even when their last key is removed. Every mutation holds the write lock
/// for the duration of one map operation, so concurrent writers to the same
/// key resolve as last-writer-wins by completion order.
#[derive(Debug)]
pub struct BucketMap<V> {
    buckets: RwLock<BTreeMap<String, Bucket<V>>>,
}

impl<V: Clone> BucketMap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace the value at `bucket`/`key`, returning the old one.
    pub fn upsert(&self, bucket: &str, key: &str, value: V) -> Option<V> {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value)
    }

    /// Value at `bucket`/`key`.
    pub fn get(&self, bucket: &str, key: &str) -> Option<V> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// True when `bucket`/`key` holds a value.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .read()
            .get(bucket)
            .is_some_and(|entries| entries.contains_key(key))
    }

    /// Remove the value at `bucket`/`key`, returning it.
    pub fn remove(&self, bucket: &str, key: &str) -> Option<V> {
        self.buckets
            .write()
            .get_mut(bucket)
            .and_then(|entries| entries.remove(key))
    }

    /// Keys of `bucket` accepted by `filter`, ordinal ascending.
    pub fn keys(&self, bucket: &str, filter: impl Fn(&str) -> bool) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|entries| {
                entries
                    .keys()
                    .filter(|key| filter(key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Copy of every entry in `bucket`; empty for an unknown bucket.
    pub fn bucket(&self, bucket: &str) -> BTreeMap<String, V> {
        self.buckets
            .read()
            .get(bucket)
            .cloned()
            .unwrap_or_default()
    }

    /// Bucket names, ordinal ascending.
    pub fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().keys().cloned().collect()
    }

    /// Number of values across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(BTreeMap::len).sum()
    }

    /// True when no bucket holds a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of `measure` over every value, computed from the live map.
    pub fn sum_by(&self, measure: impl Fn(&V) -> u64) -> u64 {
        self.buckets
            .read()
            .values()
            .flat_map(BTreeMap::values)
            .map(measure)
            .sum()
    }

    /// Drop every bucket.
    pub fn clear(&self) {
        self.buckets.write().clear();
    }
}

impl<V: Clone> Default for BucketMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
