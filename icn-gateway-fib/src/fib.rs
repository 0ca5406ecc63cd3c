//! Forwarding Information Base.
//!
//! Maps content-name prefixes to the set of mesh addresses serving them. The
//! table is bounded and evicts the least recently used prefix when full.
//! Lookups run a two-stage longest-prefix match: an exact match on the full
//! name first, then progressively shorter prefixes, where concrete entries win
//! immediately and virtual entries only answer names inside their aggregation
//! window.

use crate::cache::{BoundedRecencyCache, CacheError};
use icn_gateway_common::{
    name::{canonical, depth, extract_prefix},
    types::{DEFAULT_FIB_CAPACITY, DEFAULT_MAX_VIRTUAL_DEPTH},
    MeshAddress,
};
use log::{debug, trace};
use std::collections::BTreeSet;

/// Set of next hops for a prefix.
pub type NextHops = BTreeSet<MeshAddress>;

/// A FIB entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibEntry {
    /// Whether this entry aggregates deeper, unregistered names
    pub is_virtual: bool,
    /// Depth of the prefix the entry was registered under
    pub maximum_depth: usize,
    /// Mesh addresses serving the prefix
    pub next_hops: NextHops,
}

impl FibEntry {
    /// Create a concrete entry for a prefix of the given depth
    pub fn concrete(maximum_depth: usize, next_hops: NextHops) -> Self {
        Self {
            is_virtual: false,
            maximum_depth,
            next_hops,
        }
    }

    /// Create a virtual (aggregating) entry for a prefix of the given depth
    pub fn aggregate(maximum_depth: usize, next_hops: NextHops) -> Self {
        Self {
            is_virtual: true,
            maximum_depth,
            next_hops,
        }
    }

    /// Whether this entry may answer a name of depth `name_depth` during
    /// the degrade stage of a lookup.
    fn answers(&self, name_depth: usize, max_virtual_depth: usize) -> bool {
        !self.is_virtual || name_depth <= self.maximum_depth + max_virtual_depth
    }
}

/// Bounded forwarding table with hierarchical longest-prefix match.
#[derive(Debug)]
pub struct ForwardingTable {
    entries: BoundedRecencyCache<FibEntry>,
    max_virtual_depth: usize,
}

impl Default for ForwardingTable {
    fn default() -> Self {
        Self::new(DEFAULT_FIB_CAPACITY, DEFAULT_MAX_VIRTUAL_DEPTH)
    }
}

impl ForwardingTable {
    /// Create a table holding at most `capacity` prefixes
    pub fn new(capacity: usize, max_virtual_depth: usize) -> Self {
        Self {
            entries: BoundedRecencyCache::with_capacity(capacity),
            max_virtual_depth,
        }
    }

    /// Register `next_hops` for the exact prefix `name`.
    ///
    /// Any prior entry for the same prefix is replaced, not merged. Returns
    /// the prefix that was evicted to make room, if any.
    pub fn save(&mut self, name: &str, next_hops: NextHops) -> Result<Option<String>, CacheError> {
        let name_depth = depth(name);
        self.insert(name, FibEntry::concrete(name_depth, next_hops))
    }

    /// Register an aggregating entry for `name`.
    ///
    /// Besides its own prefix, the entry answers any deeper name up to
    /// `depth(name) + max_virtual_depth` components.
    pub fn save_virtual(
        &mut self,
        name: &str,
        next_hops: NextHops,
    ) -> Result<Option<String>, CacheError> {
        let name_depth = depth(name);
        self.insert(name, FibEntry::aggregate(name_depth, next_hops))
    }

    fn insert(&mut self, name: &str, entry: FibEntry) -> Result<Option<String>, CacheError> {
        let key = canonical(name);
        debug!(
            "FIB save {} -> {:?} (virtual: {}, depth: {})",
            key, entry.next_hops, entry.is_virtual, entry.maximum_depth
        );

        let evicted = self.entries.put(&key, entry)?.map(|(prefix, _)| prefix);
        if let Some(prefix) = &evicted {
            debug!("FIB full, evicted least recently used prefix {}", prefix);
        }
        Ok(evicted)
    }

    /// Resolve the next hops for `name`.
    ///
    /// Returns an empty set when no entry matches. Every entry consulted on
    /// a hit is promoted to most recently used.
    pub fn lookup(&mut self, name: &str) -> NextHops {
        let name_depth = depth(name);
        if name_depth == 0 {
            return NextHops::new();
        }

        let full = extract_prefix(name, name_depth);
        if let Some(entry) = self.entries.get(&full) {
            trace!("FIB exact match for {}", full);
            return entry.next_hops.clone();
        }

        for prefix_depth in (1..name_depth).rev() {
            let prefix = extract_prefix(name, prefix_depth);
            let Some(entry) = self.entries.get(&prefix) else {
                continue;
            };

            if entry.answers(name_depth, self.max_virtual_depth) {
                trace!("FIB prefix match for {} at {}", full, prefix);
                return entry.next_hops.clone();
            }
            trace!(
                "FIB virtual entry {} does not cover depth {}",
                prefix,
                name_depth
            );
        }

        NextHops::new()
    }

    /// Remove the exact entry for `name`. Shorter prefixes are untouched.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(&canonical(name)).is_some()
    }

    /// Whether an exact entry for `name` exists. Does not promote.
    pub fn find(&self, name: &str) -> bool {
        self.entries.contains(&canonical(name))
    }

    /// Get the exact entry for `name` without promoting it
    pub fn get(&self, name: &str) -> Option<&FibEntry> {
        self.entries.peek(&canonical(name))
    }

    /// Number of prefixes in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of prefixes
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Extra depth a virtual entry may answer for
    pub fn max_virtual_depth(&self) -> usize {
        self.max_virtual_depth
    }

    /// Iterate over all entries, most recently used first
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FibEntry)> {
        self.entries.iter()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hops(addrs: &[&str]) -> NextHops {
        addrs.iter().map(|a| MeshAddress::new(*a).unwrap()).collect()
    }

    #[test]
    fn test_exact_match() {
        let mut fib = ForwardingTable::default();
        fib.save("/a/b/c", hops(&["M1"])).unwrap();

        assert_eq!(fib.lookup("/a/b/c"), hops(&["M1"]));
    }

    #[test]
    fn test_no_route() {
        let mut fib = ForwardingTable::default();
        fib.save("/a/b/c", hops(&["M1"])).unwrap();

        assert!(fib.lookup("/a/x").is_empty());
        assert!(fib.lookup("/").is_empty());
        assert!(fib.lookup("").is_empty());
    }

    #[test]
    fn test_concrete_prefix_answers_deeper_names() {
        let mut fib = ForwardingTable::default();
        fib.save("/a", hops(&["M1"])).unwrap();
        fib.save("/a/b", hops(&["M2"])).unwrap();

        // Longest concrete prefix wins
        assert_eq!(fib.lookup("/a/b/c/d/e/f"), hops(&["M2"]));
        assert_eq!(fib.lookup("/a/z"), hops(&["M1"]));
    }

    #[test]
    fn test_virtual_window() {
        let mut fib = ForwardingTable::new(100, 2);
        fib.save_virtual("/agg", hops(&["V"])).unwrap();

        assert_eq!(fib.lookup("/agg"), hops(&["V"]));
        assert_eq!(fib.lookup("/agg/1"), hops(&["V"]));
        assert_eq!(fib.lookup("/agg/1/2"), hops(&["V"]));
        assert!(fib.lookup("/agg/1/2/3").is_empty());
    }

    #[test]
    fn test_virtual_out_of_window_falls_through_to_shorter_prefix() {
        let mut fib = ForwardingTable::new(100, 1);
        fib.save("/a", hops(&["C"])).unwrap();
        fib.save_virtual("/a/b", hops(&["V"])).unwrap();

        assert_eq!(fib.lookup("/a/b/c"), hops(&["V"]));
        assert_eq!(fib.lookup("/a/b/c/d"), hops(&["C"]));
    }

    #[test]
    fn test_save_replaces_next_hops() {
        let mut fib = ForwardingTable::default();
        fib.save("/s/1", hops(&["A", "B"])).unwrap();
        fib.save("/s/1", hops(&["C"])).unwrap();

        assert_eq!(fib.lookup("/s/1"), hops(&["C"]));
        assert_eq!(fib.len(), 1);
    }

    #[test]
    fn test_save_replaces_virtual_with_concrete() {
        let mut fib = ForwardingTable::default();
        fib.save_virtual("/s", hops(&["V"])).unwrap();
        fib.save("/s", hops(&["C"])).unwrap();

        let entry = fib.get("/s").unwrap();
        assert!(!entry.is_virtual);
        assert_eq!(entry.maximum_depth, 1);
    }

    #[test]
    fn test_keys_are_canonical() {
        let mut fib = ForwardingTable::default();
        fib.save("sensor/1/", hops(&["M1"])).unwrap();

        assert!(fib.find("/sensor/1"));
        assert_eq!(fib.lookup("//sensor//1"), hops(&["M1"]));
        assert!(fib.remove("/sensor/1"));
        assert!(fib.is_empty());
    }

    #[test]
    fn test_remove_does_not_cascade() {
        let mut fib = ForwardingTable::default();
        fib.save("/a", hops(&["M1"])).unwrap();
        fib.save("/a/b", hops(&["M2"])).unwrap();

        assert!(fib.remove("/a/b"));
        assert!(!fib.remove("/a/b"));
        assert!(fib.find("/a"));
        assert_eq!(fib.lookup("/a/b"), hops(&["M1"]));
    }

    #[test]
    fn test_lookup_promotes_matched_entry() {
        let mut fib = ForwardingTable::new(2, 3);
        fib.save("/old", hops(&["M1"])).unwrap();
        fib.save("/new", hops(&["M2"])).unwrap();

        // A prefix hit refreshes /old
        assert_eq!(fib.lookup("/old/reading"), hops(&["M1"]));

        let evicted = fib.save("/third", hops(&["M3"])).unwrap();
        assert_eq!(evicted.as_deref(), Some("/new"));
        assert!(fib.find("/old"));
    }

    #[test]
    fn test_find_does_not_promote() {
        let mut fib = ForwardingTable::new(2, 3);
        fib.save("/a", hops(&["M1"])).unwrap();
        fib.save("/b", hops(&["M2"])).unwrap();

        assert!(fib.find("/a"));
        let evicted = fib.save("/c", hops(&["M3"])).unwrap();
        assert_eq!(evicted.as_deref(), Some("/a"));
    }

    #[test]
    fn test_entries_in_recency_order() {
        let mut fib = ForwardingTable::default();
        fib.save("/x", hops(&["M1"])).unwrap();
        fib.save("/y", hops(&["M2"])).unwrap();
        fib.lookup("/x");

        let keys: Vec<&str> = fib.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["/x", "/y"]);
    }
}
