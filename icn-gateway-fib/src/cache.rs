//! Fixed-capacity associative store with strict LRU eviction.
//!
//! Entries live in a flat slot array linked into a recency list (head is the
//! most recently used, tail the least). A separate open-addressed hash index of
//! twice the capacity maps keys to slots using a polynomial rolling hash and
//! linear probing. Deleted index buckets become tombstones so that probe chains
//! running through them stay intact; the index is rebuilt once tombstones
//! outnumber the capacity.

use std::fmt;
use thiserror::Error;

/// Errors reported by [`BoundedRecencyCache`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No bucket of the hash index could take the key.
    #[error("hash index exhausted while inserting {0:?}")]
    IndexExhausted(String),
}

/// Position of an entry in the slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotId(usize);

/// State of one hash-index bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Empty,
    Tombstone,
    Occupied(SlotId),
}

#[derive(Debug)]
struct Slot<V> {
    entry: Option<(String, V)>,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

impl<V> Slot<V> {
    fn vacant() -> Self {
        Self {
            entry: None,
            prev: None,
            next: None,
        }
    }

    fn holds(&self, key: &str) -> bool {
        matches!(&self.entry, Some((k, _)) if k == key)
    }
}

/// Fixed-capacity LRU cache keyed by strings.
pub struct BoundedRecencyCache<V> {
    slots: Vec<Slot<V>>,
    index: Vec<Bucket>,
    free: Vec<SlotId>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
    tombstones: usize,
}

impl<V> BoundedRecencyCache<V> {
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| Slot::vacant()).collect(),
            index: vec![Bucket::Empty; capacity * 2],
            free: (0..capacity).rev().map(SlotId).collect(),
            head: None,
            tail: None,
            len: 0,
            tombstones: 0,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts or replaces `key`, making it the most recently used entry.
    ///
    /// When a new key arrives while the cache is full, the least recently used
    /// entry is evicted and returned.
    pub fn put(&mut self, key: &str, value: V) -> Result<Option<(String, V)>, CacheError> {
        if let Some((_, id)) = self.find_bucket(key) {
            if let Some((_, stored)) = self.slots[id.0].entry.as_mut() {
                *stored = value;
            }
            self.move_to_front(id);
            return Ok(None);
        }

        let mut evicted = None;
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                // Full: recycle the least recently used slot
                let Some(victim) = self.tail else {
                    return Err(CacheError::IndexExhausted(key.to_string()));
                };
                evicted = self.detach(victim);
                victim
            }
        };

        let Some(bucket) = self.vacant_bucket(key) else {
            self.free.push(id);
            return Err(CacheError::IndexExhausted(key.to_string()));
        };
        if self.index[bucket] == Bucket::Tombstone {
            self.tombstones -= 1;
        }
        self.index[bucket] = Bucket::Occupied(id);
        self.slots[id.0].entry = Some((key.to_string(), value));
        self.link_front(id);
        self.len += 1;

        Ok(evicted)
    }

    /// Returns the value for `key` and promotes it to most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let (_, id) = self.find_bucket(key)?;
        self.move_to_front(id);
        self.slots[id.0].entry.as_ref().map(|(_, value)| value)
    }

    /// Returns the value for `key` without touching the recency order.
    pub fn peek(&self, key: &str) -> Option<&V> {
        let (_, id) = self.find_bucket(key)?;
        self.slots[id.0].entry.as_ref().map(|(_, value)| value)
    }

    /// Membership test; does not promote.
    pub fn contains(&self, key: &str) -> bool {
        self.find_bucket(key).is_some()
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let (_, id) = self.find_bucket(key)?;
        let (_, value) = self.detach(id)?;
        self.free.push(id);
        Some(value)
    }

    /// Drops every entry and resets all bookkeeping.
    pub fn clear(&mut self) {
        let capacity = self.capacity();
        for slot in &mut self.slots {
            *slot = Slot::vacant();
        }
        self.index.fill(Bucket::Empty);
        self.free = (0..capacity).rev().map(SlotId).collect();
        self.head = None;
        self.tail = None;
        self.len = 0;
        self.tombstones = 0;
    }

    /// Iterates over entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            cache: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /* ------------------------------------------------------------ *
     * Hash index
     * ------------------------------------------------------------ */

    fn home_bucket(&self, key: &str) -> usize {
        let hash = key
            .bytes()
            .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32));
        hash as usize % self.index.len()
    }

    fn probe(&self, key: &str) -> impl Iterator<Item = usize> {
        let start = self.home_bucket(key);
        let buckets = self.index.len();
        (0..buckets).map(move |step| (start + step) % buckets)
    }

    fn find_bucket(&self, key: &str) -> Option<(usize, SlotId)> {
        for bucket in self.probe(key) {
            match self.index[bucket] {
                Bucket::Empty => return None,
                Bucket::Tombstone => continue,
                Bucket::Occupied(id) if self.slots[id.0].holds(key) => return Some((bucket, id)),
                Bucket::Occupied(_) => continue,
            }
        }
        None
    }

    fn vacant_bucket(&self, key: &str) -> Option<usize> {
        self.probe(key)
            .find(|&bucket| !matches!(self.index[bucket], Bucket::Occupied(_)))
    }

    fn rebuild_index(&mut self) {
        self.index.fill(Bucket::Empty);
        self.tombstones = 0;

        let mut cursor = self.head;
        while let Some(id) = cursor {
            if let Some((key, _)) = &self.slots[id.0].entry {
                if let Some(bucket) = self.vacant_bucket(key) {
                    self.index[bucket] = Bucket::Occupied(id);
                }
            }
            cursor = self.slots[id.0].next;
        }
    }

    /* ------------------------------------------------------------ *
     * Recency list
     * ------------------------------------------------------------ */

    /// Unlinks `id`, clears its index bucket and returns its entry.
    fn detach(&mut self, id: SlotId) -> Option<(String, V)> {
        let key = self.slots[id.0].entry.as_ref().map(|(k, _)| k.clone())?;
        if let Some((bucket, _)) = self.find_bucket(&key) {
            self.index[bucket] = Bucket::Tombstone;
            self.tombstones += 1;
        }

        self.unlink(id);
        self.len -= 1;
        let entry = self.slots[id.0].entry.take();

        if self.tombstones > self.capacity() {
            self.rebuild_index();
        }
        entry
    }

    fn link_front(&mut self, id: SlotId) {
        self.slots[id.0].prev = None;
        self.slots[id.0].next = self.head;
        if let Some(old_head) = self.head {
            self.slots[old_head.0].prev = Some(id);
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    fn unlink(&mut self, id: SlotId) {
        let (prev, next) = (self.slots[id.0].prev, self.slots[id.0].next);

        match prev {
            Some(prev) => self.slots[prev.0].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next.0].prev = prev,
            None => self.tail = prev,
        }

        self.slots[id.0].prev = None;
        self.slots[id.0].next = None;
    }

    fn move_to_front(&mut self, id: SlotId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(id);
        self.link_front(id);
    }
}

impl<V: fmt::Debug> fmt::Debug for BoundedRecencyCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over cache entries in recency order.
pub struct Iter<'a, V> {
    cache: &'a BoundedRecencyCache<V>,
    cursor: Option<SlotId>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = &self.cache.slots[self.cursor?.0];
        self.cursor = slot.next;
        self.remaining -= 1;
        slot.entry.as_ref().map(|(key, value)| (key.as_str(), value))
    }
}
