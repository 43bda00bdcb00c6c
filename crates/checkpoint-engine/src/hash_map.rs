//! An open-hashed, bucket-chained map from `u64` key to an arbitrary
//! value, with FIFO insertion order within a bucket and automatic growth
//! by load factor. Backs all four indexes of [`crate::log::CheckpointLog`].

use std::collections::TryReserveError;

use crate::linked_list::CheckpointList;

/// Initial bucket count for a freshly created table.
pub const INITIAL_BUCKET_COUNT: usize = 10;
const GROWTH_FACTOR: usize = 9;
const LOAD_FACTOR_NUMERATOR: usize = 3;
/// Number of times a resize allocation is retried before being silently
/// abandoned.
const RESIZE_RETRY_ATTEMPTS: u32 = 20;

pub struct CheckpointMap<V> {
    buckets: Vec<CheckpointList<(u64, V)>>,
    num_elements: usize,
}

impl<V> Default for CheckpointMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CheckpointMap<V> {
    pub fn new() -> Self {
        Self::with_bucket_count(INITIAL_BUCKET_COUNT)
    }

    pub fn with_bucket_count(bucket_count: usize) -> Self {
        assert!(bucket_count > 0, "bucket_count must be positive");
        let mut buckets = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            buckets.push(CheckpointList::new());
        }
        CheckpointMap {
            buckets,
            num_elements: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.num_elements
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index_for(&self, key: u64) -> usize {
        (key % self.buckets.len() as u64) as usize
    }

    /// Inserts `key -> value`. Replaces and returns the prior value if the
    /// key was already present; the caller owns the returned value.
    pub fn insert(&mut self, key: u64, value: V) -> Option<V> {
        self.maybe_grow();

        let idx = self.bucket_index_for(key);
        let mut cursor = self.buckets[idx].cursor_front();
        loop {
            let matches = cursor.with_payload(|(k, _)| *k == key).unwrap_or(false);
            if matches {
                return cursor.with_payload_mut(|(_, v)| std::mem::replace(v, value));
            }
            if !cursor.advance() {
                break;
            }
        }
        drop(cursor);

        self.buckets[idx].push_front((key, value));
        self.num_elements += 1;
        None
    }

    /// Returns a clone of the stored value; the map retains ownership of
    /// the original.
    pub fn get(&self, key: u64) -> Option<V>
    where
        V: Clone,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let idx = self.bucket_index_for(key);
        self.buckets[idx]
            .to_vec()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: u64) -> bool {
        if self.buckets.is_empty() {
            return false;
        }
        let idx = self.bucket_index_for(key);
        self.buckets[idx].to_vec().iter().any(|(k, _)| *k == key)
    }

    /// Removes `key`, transferring ownership of its value to the caller.
    pub fn remove(&mut self, key: u64) -> Option<V> {
        if self.buckets.is_empty() {
            return None;
        }
        let idx = self.bucket_index_for(key);
        let mut cursor = self.buckets[idx].cursor_front();
        loop {
            let matches = cursor.with_payload(|(k, _)| *k == key).unwrap_or(false);
            if matches {
                let removed = cursor.delete_and_take();
                self.num_elements -= 1;
                return removed.map(|(_, v)| v);
            }
            if !cursor.advance() {
                return None;
            }
        }
    }

    /// Every `(key, value)` pair, bucket-index ascending then bucket
    /// (insertion) order within each bucket. Used by `list` and by the
    /// serializer.
    pub fn entries(&self) -> Vec<(u64, V)>
    where
        V: Clone,
    {
        let mut out = Vec::with_capacity(self.num_elements);
        for bucket in &self.buckets {
            out.extend(bucket.to_vec());
        }
        out
    }

    pub fn keys(&self) -> Vec<u64>
    where
        V: Clone,
    {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    fn maybe_grow(&mut self) {
        if self.num_elements < LOAD_FACTOR_NUMERATOR * self.buckets.len() {
            return;
        }

        let new_count = self.buckets.len() * GROWTH_FACTOR;
        let mut attempts_left = RESIZE_RETRY_ATTEMPTS;
        loop {
            match self.try_grow_to(new_count) {
                Ok(()) => {
                    tracing::debug!(
                        new_buckets = new_count,
                        elements = self.num_elements,
                        "hash map resized"
                    );
                    return;
                }
                Err(_) => {
                    if attempts_left == 0 {
                        tracing::warn!(
                            "hash map resize abandoned after {RESIZE_RETRY_ATTEMPTS} attempts; continuing unresized"
                        );
                        return;
                    }
                    attempts_left -= 1;
                }
            }
        }
    }

    fn try_grow_to(&mut self, new_count: usize) -> Result<(), TryReserveError> {
        let mut new_buckets: Vec<CheckpointList<(u64, V)>> = Vec::new();
        new_buckets.try_reserve_exact(new_count)?;
        for _ in 0..new_count {
            new_buckets.push(CheckpointList::new());
        }

        let old_buckets = std::mem::replace(&mut self.buckets, new_buckets);
        for mut bucket in old_buckets {
            while let Some((k, v)) = bucket.pop_front() {
                let idx = (k % self.buckets.len() as u64) as usize;
                self.buckets[idx].push_front((k, v));
            }
        }
        Ok(())
    }
}
