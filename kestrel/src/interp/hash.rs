//! Chained hash table with incremental rehashing
//!
//! Two bucket arrays are kept. While a resize is in progress, nodes migrate
//! from `hb[0]` to `hb[1]` a few buckets at a time: every search, insert and
//! removal performs one migration step first, so no single operation pays for
//! the whole resize. New nodes always land in the table being filled.
//!
//! The table is generic over its node type; hashing, equality and the
//! optional construct/destruct hooks come from a [`NodeOps`] implementation.

use rustc_hash::FxHasher;
use std::hash::Hasher;
use tracing::trace;

/// Bucket count of a freshly sized table
pub const INITIAL_SIZE: usize = 8;

/// Largest bucket count a table may request
const MAX_SIZE: usize = isize::MAX as usize + 1;

/// Load factor at which a table grows even when resizing is disabled
const FORCE_RESIZE_RATIO: usize = 5;

/// Empty buckets visited per requested rehash step before giving up
const EMPTY_VISITS_PER_STEP: usize = 10;

/// Per-table behavior for a node type
pub trait NodeOps<T> {
    fn hash(&self, node: &T) -> u64;

    fn compare(&self, a: &T, b: &T) -> bool;

    /// Called on a node as it enters the table
    fn construct(&mut self, _node: &mut T) {}

    /// Called on a node leaving the table through `remove`, `replace` or `clear`
    fn destruct(&mut self, _node: T) {}
}

/// Node types identified by a name (registries)
pub trait Named {
    fn name(&self) -> &str;
}

/// Hash a name the same way every registry does
pub fn hash_name(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(name.as_bytes());
    hasher.finish()
}

/// [`NodeOps`] for any [`Named`] node
#[derive(Debug, Default, Clone, Copy)]
pub struct NameOps;

impl<T: Named> NodeOps<T> for NameOps {
    fn hash(&self, node: &T) -> u64 {
        hash_name(node.name())
    }

    fn compare(&self, a: &T, b: &T) -> bool {
        a.name() == b.name()
    }
}

#[derive(Debug)]
struct Bucket<T> {
    chains: Vec<Vec<T>>,
    used: usize,
}

impl<T> Bucket<T> {
    fn empty() -> Self {
        Bucket {
            chains: Vec::new(),
            used: 0,
        }
    }

    fn with_size(size: usize) -> Self {
        let mut chains = Vec::with_capacity(size);
        chains.resize_with(size, Vec::new);
        Bucket { chains, used: 0 }
    }

    fn size(&self) -> usize {
        self.chains.len()
    }

    fn slot(&self, hash: u64) -> usize {
        (hash & (self.size() as u64 - 1)) as usize
    }
}

/// Generic chained hash table
#[derive(Debug)]
pub struct HashTable<T, O: NodeOps<T>> {
    hb: [Bucket<T>; 2],
    rehashidx: Option<usize>,
    resize_enabled: bool,
    ops: O,
}

impl<T, O: NodeOps<T> + Default> Default for HashTable<T, O> {
    fn default() -> Self {
        Self::new(O::default())
    }
}

impl<T, O: NodeOps<T>> HashTable<T, O> {
    /// Create an empty table; buckets are allocated on first insert
    pub fn new(ops: O) -> Self {
        HashTable {
            hb: [Bucket::empty(), Bucket::empty()],
            rehashidx: None,
            resize_enabled: true,
            ops,
        }
    }

    /// Number of live nodes
    pub fn size(&self) -> usize {
        self.hb[0].used + self.hb[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_rehashing(&self) -> bool {
        self.rehashidx.is_some()
    }

    /// Bucket counts of both arrays
    pub fn bucket_sizes(&self) -> (usize, usize) {
        (self.hb[0].size(), self.hb[1].size())
    }

    /// Node counts of both arrays
    pub fn table_used(&self) -> (usize, usize) {
        (self.hb[0].used, self.hb[1].used)
    }

    pub fn set_resize_enabled(&mut self, enabled: bool) {
        self.resize_enabled = enabled;
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Insert a node; returns false and leaves the table unchanged if an
    /// equal node is already present
    pub fn insert(&mut self, node: T) -> bool {
        self.step();
        if self.locate(&node).is_some() {
            return false;
        }
        self.insert_new(node);
        true
    }

    /// Insert or overwrite. Returns true when the node was new; otherwise the
    /// previous node is handed to `destruct` and false is returned.
    pub fn replace(&mut self, mut node: T) -> bool {
        self.step();
        match self.locate(&node) {
            Some((t, i, p)) => {
                self.ops.construct(&mut node);
                let old = std::mem::replace(&mut self.hb[t].chains[i][p], node);
                self.ops.destruct(old);
                false
            }
            None => {
                self.insert_new(node);
                true
            }
        }
    }

    /// Find the node equal to `needle`
    pub fn search(&mut self, needle: &T) -> Option<&T> {
        self.step();
        let (t, i, p) = self.locate(needle)?;
        Some(&self.hb[t].chains[i][p])
    }

    pub fn search_mut(&mut self, needle: &T) -> Option<&mut T> {
        self.step();
        let (t, i, p) = self.locate(needle)?;
        Some(&mut self.hb[t].chains[i][p])
    }

    /// Lookup that does not advance a pending rehash
    pub fn peek(&self, needle: &T) -> Option<&T> {
        let (t, i, p) = self.locate(needle)?;
        Some(&self.hb[t].chains[i][p])
    }

    /// Unlink the node equal to `needle` and return it without running `destruct`
    pub fn take(&mut self, needle: &T) -> Option<T> {
        self.step();
        let (t, i, p) = self.locate(needle)?;
        self.hb[t].used -= 1;
        Some(self.hb[t].chains[i].swap_remove(p))
    }

    /// Remove the node equal to `needle`, running `destruct` on it
    pub fn remove(&mut self, needle: &T) -> bool {
        match self.take(needle) {
            Some(node) => {
                self.ops.destruct(node);
                true
            }
            None => false,
        }
    }

    /// Start a resize to hold at least `size` nodes.
    ///
    /// Fails while a rehash is in progress, when `size` is smaller than the
    /// number of stored nodes, or when the rounded size equals the current one.
    pub fn expand(&mut self, size: usize) -> bool {
        if self.is_rehashing() || self.hb[0].used > size {
            return false;
        }
        let real = next_power(size);
        if real == self.hb[0].size() {
            return false;
        }
        let bucket = Bucket::with_size(real);
        if self.hb[0].size() == 0 {
            self.hb[0] = bucket;
            return true;
        }
        trace!(from = self.hb[0].size(), to = real, "hash table expand");
        self.hb[1] = bucket;
        self.rehashidx = Some(0);
        true
    }

    /// Migrate up to `steps` non-empty buckets. Returns true while nodes
    /// remain to be moved.
    pub fn rehash(&mut self, steps: usize) -> bool {
        let Some(mut idx) = self.rehashidx else {
            return false;
        };
        let mut empty_visits = steps * EMPTY_VISITS_PER_STEP;
        let mut steps = steps;

        while steps > 0 && self.hb[0].used != 0 {
            // hb[0].used > 0 guarantees a non-empty chain at or after idx
            while self.hb[0].chains[idx].is_empty() {
                idx += 1;
                empty_visits -= 1;
                if empty_visits == 0 {
                    self.rehashidx = Some(idx);
                    return true;
                }
            }
            let chain = std::mem::take(&mut self.hb[0].chains[idx]);
            for node in chain {
                let slot = self.hb[1].slot(self.ops.hash(&node));
                self.hb[0].used -= 1;
                self.hb[1].used += 1;
                self.hb[1].chains[slot].push(node);
            }
            idx += 1;
            steps -= 1;
        }

        if self.hb[0].used == 0 {
            self.hb[0] = std::mem::replace(&mut self.hb[1], Bucket::empty());
            self.rehashidx = None;
            return false;
        }
        self.rehashidx = Some(idx);
        true
    }

    /// Remove every node, running `destruct` on each
    pub fn clear(&mut self) {
        let buckets = std::mem::replace(&mut self.hb, [Bucket::empty(), Bucket::empty()]);
        self.rehashidx = None;
        for bucket in buckets {
            for node in bucket.chains.into_iter().flatten() {
                self.ops.destruct(node);
            }
        }
    }

    /// All nodes, `hb[0]` first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.hb.iter().flat_map(|bucket| bucket.chains.iter().flatten())
    }

    fn step(&mut self) {
        if self.is_rehashing() {
            self.rehash(1);
        }
    }

    fn insert_new(&mut self, mut node: T) {
        self.expand_if_needed();
        self.ops.construct(&mut node);
        let t = usize::from(self.is_rehashing());
        let slot = self.hb[t].slot(self.ops.hash(&node));
        self.hb[t].chains[slot].push(node);
        self.hb[t].used += 1;
    }

    fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }
        let (size, used) = (self.hb[0].size(), self.hb[0].used);
        if size == 0 {
            self.expand(INITIAL_SIZE);
        } else if used >= size && (self.resize_enabled || used / size > FORCE_RESIZE_RATIO) {
            self.expand(used.saturating_mul(2));
        }
    }

    fn locate(&self, needle: &T) -> Option<(usize, usize, usize)> {
        if self.hb[0].size() == 0 {
            return None;
        }
        let hash = self.ops.hash(needle);
        for t in 0..2 {
            let bucket = &self.hb[t];
            let slot = bucket.slot(hash);
            if let Some(p) = bucket.chains[slot].iter().position(|n| self.ops.compare(n, needle)) {
                return Some((t, slot, p));
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }
}

fn next_power(size: usize) -> usize {
    if size >= MAX_SIZE {
        return MAX_SIZE;
    }
    size.next_power_of_two().max(INITIAL_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct IntOps {
        constructed: usize,
        destructed: Vec<(u64, &'static str)>,
    }

    impl NodeOps<(u64, &'static str)> for IntOps {
        fn hash(&self, node: &(u64, &'static str)) -> u64 {
            node.0
        }

        fn compare(&self, a: &(u64, &'static str), b: &(u64, &'static str)) -> bool {
            a.0 == b.0
        }

        fn construct(&mut self, _node: &mut (u64, &'static str)) {
            self.constructed += 1;
        }

        fn destruct(&mut self, node: (u64, &'static str)) {
            self.destructed.push(node);
        }
    }

    type Table = HashTable<(u64, &'static str), IntOps>;

    fn filled(n: u64) -> Table {
        let mut table = Table::default();
        for k in 0..n {
            assert!(table.insert((k, "v")));
        }
        table
    }

    fn finish_rehash(table: &mut Table) {
        while table.rehash(100) {}
    }

    #[test]
    fn test_insert_and_search() {
        let mut table = filled(5);
        assert_eq!(table.size(), 5);
        assert_eq!(table.search(&(3, "")), Some(&(3, "v")));
        assert_eq!(table.search(&(9, "")), None);
        assert_eq!(table.bucket_sizes(), (INITIAL_SIZE, 0));
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let mut table = filled(3);
        assert!(!table.insert((1, "other")));
        assert_eq!(table.size(), 3);
        assert_eq!(table.peek(&(1, "")), Some(&(1, "v")));
    }

    #[test]
    fn test_growth_starts_incremental_rehash() {
        let mut table = filled(8);
        assert!(!table.is_rehashing());
        assert!(table.insert((8, "v")));
        assert!(table.is_rehashing());
        assert_eq!(table.bucket_sizes(), (8, 16));
        assert_eq!(table.table_used(), (8, 1));
        assert_eq!(table.size(), 9);

        for k in 0..9 {
            assert!(table.search(&(k, "")).is_some(), "key {k} lost during rehash");
        }
        finish_rehash(&mut table);
        assert!(!table.is_rehashing());
        assert_eq!(table.bucket_sizes(), (16, 0));
        assert_eq!(table.table_used(), (9, 0));
    }

    #[test]
    fn test_bucket_count_stays_power_of_two() {
        let mut table = Table::default();
        for k in 0..1000 {
            table.insert((k * 7919, "v"));
            let (a, b) = table.bucket_sizes();
            assert!(a.is_power_of_two());
            assert!(b == 0 || b.is_power_of_two());
        }
        assert_eq!(table.size(), 1000);
        assert_eq!(table.iter().count(), 1000);
    }

    #[test]
    fn test_rehash_terminates_with_empty_buckets() {
        let mut table = Table::default();
        // Every key lands in bucket 0, leaving long runs of empty buckets
        for k in 0..8 {
            table.insert((k * 64, "v"));
        }
        table.insert((8 * 64, "v"));
        assert!(table.is_rehashing());
        let mut rounds = 0;
        while table.rehash(1) {
            rounds += 1;
            assert!(rounds < 100);
        }
        assert_eq!(table.size(), 9);
    }

    #[test]
    fn test_rehash_when_idle_is_noop() {
        let mut table = filled(3);
        assert!(!table.rehash(10));
        assert_eq!(table.size(), 3);
    }

    #[test]
    fn test_replace_runs_destruct_on_old_node() {
        let mut table = filled(2);
        assert!(!table.replace((1, "new")));
        assert!(table.replace((7, "fresh")));
        assert_eq!(table.peek(&(1, "")), Some(&(1, "new")));
        assert_eq!(table.ops().destructed, vec![(1, "v")]);
        assert_eq!(table.size(), 3);
    }

    #[test]
    fn test_remove_and_take() {
        let mut table = filled(4);
        assert!(table.remove(&(2, "")));
        assert!(!table.remove(&(2, "")));
        assert_eq!(table.take(&(3, "")), Some((3, "v")));
        assert_eq!(table.size(), 2);
        assert_eq!(table.ops().destructed, vec![(2, "v")]);
    }

    #[test]
    fn test_remove_during_rehash() {
        let mut table = filled(9);
        assert!(table.is_rehashing());
        for k in 0..9 {
            assert!(table.remove(&(k, "")));
        }
        assert_eq!(table.size(), 0);
    }

    #[test]
    fn test_clear_destructs_everything() {
        let mut table = filled(10);
        table.clear();
        assert_eq!(table.size(), 0);
        assert!(!table.is_rehashing());
        assert_eq!(table.ops().destructed.len(), 10);
        assert!(table.insert((1, "again")));
    }

    #[test]
    fn test_construct_hook_runs_on_insert() {
        let table = filled(6);
        assert_eq!(table.ops().constructed, 6);
    }

    #[test]
    fn test_resize_disabled_until_forced() {
        let mut table = Table::default();
        table.set_resize_enabled(false);
        for k in 0..40 {
            table.insert((k, "v"));
        }
        assert_eq!(table.bucket_sizes().0, INITIAL_SIZE);
        for k in 40..49 {
            table.insert((k, "v"));
        }
        assert!(table.is_rehashing() || table.bucket_sizes().0 > INITIAL_SIZE);
    }

    #[test]
    fn test_expand_rules() {
        let mut table = filled(5);
        assert!(!table.expand(3));
        assert!(!table.expand(INITIAL_SIZE));
        assert!(table.expand(20));
        assert_eq!(table.bucket_sizes(), (8, 32));
        assert!(!table.expand(64));
        assert_eq!(next_power(usize::MAX), MAX_SIZE);
        assert_eq!(next_power(0), INITIAL_SIZE);
    }

    struct Entry(&'static str);

    impl Named for Entry {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_name_ops() {
        let mut registry: HashTable<Entry, NameOps> = HashTable::default();
        assert!(registry.insert(Entry("math")));
        assert!(!registry.insert(Entry("math")));
        assert!(registry.peek(&Entry("math")).is_some());
        assert!(registry.peek(&Entry("os")).is_none());
    }
}
