//! `HashTable<K, V>` — a separate-chaining hash table that starts small
//! (stack-sized, per the original's `TCL_SMALL_HASH_TABLE`), grows by
//! quadrupling, and optionally scrambles bucket indices with the same
//! multiplicative hash `tclHash.c` uses for `RANDOM_INDEX`.
//!
//! `K: Hash + Eq` stands in for the original's pluggable key-type
//! descriptor (`hash`/`equal`/`allocEntry`/`freeEntry` hooks) — Rust's
//! standard traits already capture `hash` and `equal`, and the allocator
//! handles entry allocation, so there is no separate vtable to plumb.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const SMALL_HASH_TABLE: usize = 4;
const REBUILD_MULTIPLIER: usize = 3;
const RANDOM_INDEX_MULTIPLIER: u64 = 1_103_515_245;

struct Entry<K, V> {
    hash: u64,
    key: K,
    value: V,
    next: Option<Box<Entry<K, V>>>,
}

/// Whether bucket indices are derived by scrambling the hash (matching
/// `tclHash.c`'s `RANDOM_INDEX`) or by a plain mask. Scrambling spreads
/// hashes that differ only in their low bits; a plain mask is cheaper when
/// the caller's hash function already does that spreading itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    Scrambled,
    Plain,
}

pub struct HashTable<K, V> {
    buckets: Vec<Option<Box<Entry<K, V>>>>,
    num_entries: usize,
    rebuild_size: usize,
    down_shift: u32,
    mask: u64,
    strategy: IndexStrategy,
}

impl<K: Hash + Eq, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> HashTable<K, V> {
    pub fn new() -> Self {
        Self::with_strategy(IndexStrategy::Scrambled)
    }

    pub fn with_strategy(strategy: IndexStrategy) -> Self {
        let mut buckets = Vec::with_capacity(SMALL_HASH_TABLE);
        buckets.resize_with(SMALL_HASH_TABLE, || None);
        HashTable {
            buckets,
            num_entries: 0,
            rebuild_size: SMALL_HASH_TABLE * REBUILD_MULTIPLIER,
            down_shift: 28,
            mask: 3,
            strategy,
        }
    }

    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    fn hash_of(key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn index_of(&self, hash: u64) -> usize {
        let idx = match self.strategy {
            IndexStrategy::Scrambled => {
                (hash.wrapping_mul(RANDOM_INDEX_MULTIPLIER) >> self.down_shift) & self.mask
            }
            IndexStrategy::Plain => hash & self.mask,
        };
        idx as usize
    }

    /// Return the existing entry for `key`, or insert `value` and return
    /// it. `outNew` in the original becomes the returned bool.
    pub fn create_or_find(&mut self, key: K, value: V) -> (&mut V, bool)
    where
        K: Clone,
    {
        let hash = Self::hash_of(&key);
        let idx = self.index_of(hash);

        let exists = {
            let mut cursor = self.buckets[idx].as_deref();
            let mut found = false;
            while let Some(entry) = cursor {
                if entry.hash == hash && entry.key == key {
                    found = true;
                    break;
                }
                cursor = entry.next.as_deref();
            }
            found
        };

        if !exists {
            let new_entry = Box::new(Entry {
                hash,
                key: key.clone(),
                value,
                next: self.buckets[idx].take(),
            });
            self.buckets[idx] = Some(new_entry);
            self.num_entries += 1;
            if self.num_entries >= self.rebuild_size {
                self.rebuild();
            }
        }

        let idx = self.index_of(hash);
        let mut cursor = self.buckets[idx].as_deref_mut();
        while let Some(entry) = cursor {
            if entry.hash == hash && entry.key == key {
                return (&mut entry.value, !exists);
            }
            cursor = entry.next.as_deref_mut();
        }
        unreachable!("entry must exist immediately after create_or_find inserts it")
    }

    pub fn find_only(&self, key: &K) -> Option<&V> {
        let hash = Self::hash_of(key);
        let idx = self.index_of(hash);
        let mut cursor = self.buckets[idx].as_deref();
        while let Some(entry) = cursor {
            if entry.hash == hash && &entry.key == key {
                return Some(&entry.value);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    pub fn find_only_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = Self::hash_of(key);
        let idx = self.index_of(hash);
        let mut cursor = self.buckets[idx].as_deref_mut();
        while let Some(entry) = cursor {
            if entry.hash == hash && &entry.key == key {
                return Some(&mut entry.value);
            }
            cursor = entry.next.as_deref_mut();
        }
        None
    }

    /// Unlink and return the entry's value, if present.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let hash = Self::hash_of(key);
        let idx = self.index_of(hash);

        let mut slot = &mut self.buckets[idx];
        loop {
            let found = match slot {
                None => return None,
                Some(entry) => entry.hash == hash && &entry.key == key,
            };
            if found {
                let mut removed = slot.take().expect("just matched");
                *slot = removed.next.take();
                self.num_entries -= 1;
                return Some(removed.value);
            }
            slot = &mut slot.as_mut().unwrap().next;
        }
    }

    /// Quadruple the bucket count, halve the down-shift, and re-index every
    /// entry using its stored hash (never recomputed).
    fn rebuild(&mut self) {
        let new_count = self.buckets.len() * 4;
        let mut new_buckets = Vec::with_capacity(new_count);
        new_buckets.resize_with(new_count, || None);

        self.rebuild_size *= 4;
        if self.down_shift > 1 {
            self.down_shift -= 2;
        }
        self.mask = (self.mask << 2) + 3;

        for head in std::mem::take(&mut self.buckets) {
            let mut cursor = head;
            while let Some(mut entry) = cursor {
                cursor = entry.next.take();
                let idx = self.index_of(entry.hash);
                entry.next = new_buckets[idx].take();
                new_buckets[idx] = Some(entry);
            }
        }
        self.buckets = new_buckets;
        log::debug!(
            "hash table rebuilt: {} buckets, {} entries",
            self.buckets.len(),
            self.num_entries
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets.iter().flat_map(|head| {
            let mut cursor = head.as_deref();
            std::iter::from_fn(move || {
                let entry = cursor?;
                cursor = entry.next.as_deref();
                Some((&entry.key, &entry.value))
            })
        })
    }
}
