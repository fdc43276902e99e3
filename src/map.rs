//! PartitionedHashMap: the concurrent table built on partitions.
//!
//! Locking order for every operation:
//! 1. Hash the key (user `Hash` runs with no lock held).
//! 2. Take the layout lock shared.
//! 3. Take one partition lock, shared to read or exclusive to mutate. Bulk
//!    operations take several, in ascending index order, each once.
//!
//! `repartition` and `reserve` take the layout lock exclusively instead.
//! That waits out every operation in flight and hands out `&mut Layout`,
//! so migration reaches each partition through `get_mut` without touching
//! its lock at all.
//!
//! Keys and values leaving the table (`remove`, replaced values, entries
//! built for a key that turned out to exist) are dropped after all locks
//! are released, so their `Drop` may call back into the table.

use crate::construct::IntoEntry;
use crate::contracts::{ForwardIterator, SplitLast, SplitLastTwo};
use crate::error::TableError;
use crate::held::{self, Held, Mode};
use crate::partition::{check_partition_count, index_for, Layout, Partition, DEFAULT_PARTITIONS};
use crate::rw_spinlock::{RwSpinLock, RwSpinLockReadGuard, RwSpinLockWriteGuard};
use crate::storage::Storage;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use std::collections::hash_map::RandomState;

/// Keys hashed and locked together by bulk visitation.
const BULK_CHUNK: usize = 16;

type LayoutRead<'a, K, V> = Held<RwSpinLockReadGuard<'a, Layout<K, V>>>;
type LayoutWrite<'a, K, V> = Held<RwSpinLockWriteGuard<'a, Layout<K, V>>>;

/// A hash map safe to share between threads, split into independently
/// locked partitions.
///
/// Operations on keys in different partitions run in parallel. Visitors run
/// while their partition is locked and must not call back into the same
/// partition; debug builds panic when they do.
///
/// ```
/// use partitioned_hashmap::PartitionedHashMap;
///
/// let hits: PartitionedHashMap<String, u64> = PartitionedHashMap::new();
/// std::thread::scope(|s| {
///     for _ in 0..4 {
///         s.spawn(|| {
///             for page in ["/", "/about", "/"] {
///                 hits.insert_or_visit(page.to_string(), 1, |_, n| *n += 1).unwrap();
///             }
///         });
///     }
/// });
/// assert_eq!(hits.get("/"), Some(8));
/// assert_eq!(hits.get("/about"), Some(4));
/// ```
pub struct PartitionedHashMap<K, V, S = RandomState> {
    hasher: S,
    layout: RwSpinLock<Layout<K, V>>,
    #[cfg(test)]
    migration_pause: Option<std::time::Duration>,
    #[cfg(test)]
    fail_allocation: core::sync::atomic::AtomicBool,
}

impl<K, V> PartitionedHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Configure partition count, initial capacity and hasher.
    pub fn builder() -> PartitionedHashMapBuilder<K, V> {
        PartitionedHashMapBuilder::new()
    }
}

impl<K, V, S: Default> Default for PartitionedHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> PartitionedHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(hasher, Layout::new(DEFAULT_PARTITIONS))
    }

    fn from_parts(hasher: S, layout: Layout<K, V>) -> Self {
        Self {
            hasher,
            layout: RwSpinLock::new(layout),
            #[cfg(test)]
            migration_pause: None,
            #[cfg(test)]
            fail_allocation: core::sync::atomic::AtomicBool::new(false),
        }
    }

    fn read_layout(&self) -> LayoutRead<'_, K, V> {
        let token = held::enter(&self.layout, Mode::Shared);
        Held::new(token, self.layout.read())
    }

    fn write_layout(&self) -> LayoutWrite<'_, K, V> {
        let token = held::enter(&self.layout, Mode::Exclusive);
        Held::new(token, self.layout.write())
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn partition_count(&self) -> usize {
        self.read_layout().count()
    }

    /// Number of entries, read with every partition held shared at once.
    pub fn len(&self) -> usize {
        let layout = self.read_layout();
        let guards = layout.lock_all_shared();
        guards.iter().map(|g| g.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the partitions' capacities. A single full partition can still
    /// grow while this total exceeds `len`.
    pub fn capacity(&self) -> usize {
        let layout = self.read_layout();
        let guards = layout.lock_all_shared();
        guards.iter().map(|g| g.capacity()).sum()
    }

    /// Call `f` on every entry, one partition at a time. Returns the
    /// number of entries visited.
    ///
    /// Not a snapshot: entries can move in and out of partitions not yet
    /// (or no longer) locked.
    pub fn cvisit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &V),
    {
        let layout = self.read_layout();
        layout.iter().map(|p| p.read().for_each(&mut f)).sum()
    }

    /// Mutable counterpart of [`cvisit_all`](Self::cvisit_all).
    pub fn visit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &mut V),
    {
        let layout = self.read_layout();
        layout.iter().map(|p| p.write().for_each_mut(&mut f)).sum()
    }

    /// Keep only entries for which `keep` returns true, one partition at a
    /// time. Returns the number removed. Removed entries are dropped while
    /// their partition is locked.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let layout = self.read_layout();
        layout.iter().map(|p| p.write().retain(&mut keep)).sum()
    }

    /// Remove every entry. All partitions are held exclusively together, so
    /// no reader sees a partly cleared table.
    pub fn clear(&self) {
        let layout = self.read_layout();
        let mut guards = layout.lock_all_exclusive();
        let taken: Vec<Storage<K, V>> = guards
            .iter_mut()
            .map(|g| core::mem::take(&mut **g))
            .collect();
        drop(guards);
        drop(layout);
        drop(taken);
    }

    /// Rebuild the table with `count` partitions.
    ///
    /// Runs as a global exclusive phase: it waits for every operation in
    /// flight, and no operation starts until it finishes. The new layout is
    /// fully allocated before any entry moves; if that fails the table is
    /// left exactly as it was.
    pub fn repartition(&self, count: usize) -> Result<(), TableError> {
        let count = check_partition_count(count)?;
        let mut layout = self.write_layout();
        let from = layout.count();

        let mut sizes = Vec::new();
        sizes.try_reserve_exact(count)?;
        sizes.resize(count, 0usize);
        for p in layout.iter_mut() {
            for hash in p.get_mut().hashes() {
                sizes[index_for(hash, count)] += 1;
            }
        }

        let mut fresh = match self.allocate_layout(&sizes) {
            Ok(fresh) => fresh,
            Err(err) => {
                tracing::warn!(from, to = count, %err, "repartition aborted; layout unchanged");
                return Err(err);
            }
        };
        let moved = self.migrate(&mut layout, &mut fresh);
        *layout = fresh;
        tracing::debug!(from, to = count, entries = moved, "repartitioned");
        Ok(())
    }

    /// Make room for `additional` more entries, spread evenly across
    /// partitions. Runs as a global exclusive phase like `repartition`.
    ///
    /// On failure, partitions that already grew keep their larger
    /// allocation; contents and layout are unchanged.
    pub fn reserve(&self, additional: usize) -> Result<(), TableError> {
        let mut layout = self.write_layout();
        let per_partition = additional.div_ceil(layout.count());
        for p in layout.iter_mut() {
            if let Err(err) = p.get_mut().try_reserve(per_partition) {
                tracing::warn!(additional, %err, "reserve failed");
                return Err(err);
            }
        }
        tracing::debug!(additional, partitions = layout.count(), "reserved");
        Ok(())
    }

    fn allocate_layout(&self, capacities: &[usize]) -> Result<Layout<K, V>, TableError> {
        #[cfg(test)]
        {
            if self.fail_allocation.load(core::sync::atomic::Ordering::Relaxed) {
                return Err(TableError::CapacityExhausted);
            }
        }
        Layout::try_with_capacities(capacities)
    }

    fn migrate(&self, from: &mut Layout<K, V>, to: &mut Layout<K, V>) -> usize {
        let total = from.count();
        let mut moved = 0;
        for (i, p) in from.iter_mut().enumerate() {
            self.pause_mid_migration(i, total);
            for entry in p.get_mut().drain() {
                let idx = to.index_of(entry.hash);
                to.at_mut(idx).get_mut().push_migrated(entry);
                moved += 1;
            }
        }
        moved
    }

    #[cfg(test)]
    fn pause_mid_migration(&self, i: usize, total: usize) {
        if let (Some(pause), true) = (self.migration_pause, i == total / 2) {
            std::thread::sleep(pause);
        }
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn pause_mid_migration(&self, _: usize, _: usize) {}

    #[cfg(test)]
    fn with_migration_pause(mut self, pause: std::time::Duration) -> Self {
        self.migration_pause = Some(pause);
        self
    }

    /// Make every later layout allocation fail until switched back off.
    #[cfg(test)]
    fn set_allocation_failure(&self, fail: bool) {
        self.fail_allocation
            .store(fail, core::sync::atomic::Ordering::Relaxed);
    }

    /// Every entry lives in the partition its stored hash maps to.
    #[cfg(test)]
    pub(crate) fn assert_placement(&self) {
        let layout = self.read_layout();
        for (i, p) in layout.iter().enumerate() {
            for hash in p.read().hashes() {
                assert_eq!(layout.index_of(hash), i, "entry in wrong partition");
            }
        }
    }
}

/// Whole-table visitation fanned out over partitions on the rayon pool.
///
/// Each partition is locked by the worker that visits it, so the callback
/// runs on several threads at once: it must be `Fn + Sync + Send`. The same
/// rule as for the serial forms applies, and the callback must not call
/// back into the table.
#[cfg(feature = "rayon")]
impl<K, V, S> PartitionedHashMap<K, V, S>
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Parallel [`cvisit_all`](Self::cvisit_all).
    ///
    /// ```
    /// use partitioned_hashmap::PartitionedHashMap;
    /// use std::sync::atomic::{AtomicU64, Ordering};
    ///
    /// let map: PartitionedHashMap<u64, u64> = PartitionedHashMap::new();
    /// for k in 0..100 {
    ///     map.insert(k, k).unwrap();
    /// }
    /// let sum = AtomicU64::new(0);
    /// assert_eq!(map.par_cvisit_all(|_, v| {
    ///     sum.fetch_add(*v, Ordering::Relaxed);
    /// }), 100);
    /// assert_eq!(sum.into_inner(), 4950);
    /// ```
    pub fn par_cvisit_all<F>(&self, f: F) -> usize
    where
        F: Fn(&K, &V) + Sync + Send,
    {
        use rayon::prelude::*;
        let layout = self.read_layout();
        layout.par_partitions().map(|p| p.read().for_each(&f)).sum()
    }

    /// Parallel [`visit_all`](Self::visit_all).
    pub fn par_visit_all<F>(&self, f: F) -> usize
    where
        F: Fn(&K, &mut V) + Sync + Send,
    {
        use rayon::prelude::*;
        let layout = self.read_layout();
        layout.par_partitions().map(|p| p.write().for_each_mut(&f)).sum()
    }

    /// Parallel [`retain`](Self::retain). Returns the number removed.
    pub fn par_retain<F>(&self, keep: F) -> usize
    where
        F: Fn(&K, &mut V) -> bool + Sync + Send,
    {
        use rayon::prelude::*;
        let layout = self.read_layout();
        layout.par_partitions().map(|p| p.write().retain(&keep)).sum()
    }
}

impl<K, V, S> PartitionedHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash_of<Q: ?Sized + Hash>(&self, q: &Q) -> u64 {
        self.hasher.hash_one(q)
    }

    /// Index of the partition currently responsible for `key`.
    pub fn partition_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(key);
        self.read_layout().index_of(hash)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.cvisit(key, |_, _| {})
    }

    /// Clone of the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        let mut out = None;
        self.cvisit(key, |_, v| out = Some(v.clone()));
        out
    }

    /// Call `f` with the entry for `key`, holding its partition shared.
    /// Returns whether the key was found.
    pub fn cvisit<Q, F>(&self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V),
    {
        let hash = self.hash_of(key);
        let layout = self.read_layout();
        let storage = layout.partition(hash).read();
        match storage.find(hash, key) {
            Some(e) => {
                f(&e.key, &e.value);
                true
            }
            None => false,
        }
    }

    /// Like [`cvisit`](Self::cvisit), but `f` may fail. Its error is
    /// returned once the partition has been released.
    pub fn try_cvisit<Q, F, E>(&self, key: &Q, f: F) -> Result<bool, E>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V) -> Result<(), E>,
    {
        let hash = self.hash_of(key);
        let layout = self.read_layout();
        let storage = layout.partition(hash).read();
        let outcome = storage.find(hash, key).map(|e| f(&e.key, &e.value));
        drop(storage);
        drop(layout);
        match outcome {
            Some(res) => res.map(|()| true),
            None => Ok(false),
        }
    }

    /// Call `f` with the entry for `key`, holding its partition exclusively.
    pub fn visit<Q, F>(&self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &mut V),
    {
        let hash = self.hash_of(key);
        let layout = self.read_layout();
        let mut storage = layout.partition(hash).write();
        match storage.find_mut(hash, key) {
            Some(e) => {
                f(&e.key, &mut e.value);
                true
            }
            None => false,
        }
    }

    pub fn try_visit<Q, F, E>(&self, key: &Q, f: F) -> Result<bool, E>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &mut V) -> Result<(), E>,
    {
        let hash = self.hash_of(key);
        let layout = self.read_layout();
        let mut storage = layout.partition(hash).write();
        let outcome = storage
            .find_mut(hash, key)
            .map(|e| f(&e.key, &mut e.value));
        drop(storage);
        drop(layout);
        match outcome {
            Some(res) => res.map(|()| true),
            None => Ok(false),
        }
    }

    /// Insert a new entry. A key already present is
    /// [`TableError::DuplicateKey`] and leaves the table unchanged.
    pub fn insert(&self, key: K, value: V) -> Result<(), TableError> {
        let hash = self.hash_of(&key);
        let layout = self.read_layout();
        let mut storage = layout.partition(hash).write();
        if storage.find(hash, &key).is_some() {
            return Err(TableError::DuplicateKey);
        }
        storage.try_reserve(1)?;
        storage.insert_unique(hash, key, value);
        Ok(())
    }

    /// Insert, or overwrite the value of an existing entry. Returns true if
    /// the key was new.
    pub fn insert_or_assign(&self, key: K, value: V) -> Result<bool, TableError> {
        let hash = self.hash_of(&key);
        let replaced = {
            let layout = self.read_layout();
            let mut storage = layout.partition(hash).write();
            if let Some(e) = storage.find_mut(hash, &key) {
                Some(core::mem::replace(&mut e.value, value))
            } else {
                storage.try_reserve(1)?;
                storage.insert_unique(hash, key, value);
                None
            }
        };
        Ok(replaced.is_none())
    }

    /// Insert, or visit the existing entry instead. Returns true if the key
    /// was new; `f` only runs when it was not.
    pub fn insert_or_visit<F>(&self, key: K, value: V, f: F) -> Result<bool, TableError>
    where
        F: FnOnce(&K, &mut V),
    {
        self.upsert(key, value, |_, _| {}, f)
    }

    pub fn insert_or_cvisit<F>(&self, key: K, value: V, f: F) -> Result<bool, TableError>
    where
        F: FnOnce(&K, &V),
    {
        self.upsert(key, value, |_, _| {}, |k, v| f(k, &*v))
    }

    /// `insert_or_visit` taking a bundle `(entry args.., f)`; the entry
    /// args go through [`IntoEntry`].
    ///
    /// ```
    /// use partitioned_hashmap::{PartitionedHashMap, Piecewise};
    ///
    /// let map: PartitionedHashMap<String, Vec<u8>> = PartitionedHashMap::new();
    /// map.emplace_or_visit(("a".to_string(), vec![1], |_: &String, v: &mut Vec<u8>| v.push(2)))
    ///     .unwrap();
    /// map.emplace_or_visit((Piecewise, ("a".to_string(),), (), |_: &String, v: &mut Vec<u8>| v.push(2)))
    ///     .unwrap();
    /// assert_eq!(map.get("a"), Some(vec![1, 2]));
    /// ```
    pub fn emplace_or_visit<A>(&self, args: A) -> Result<bool, TableError>
    where
        A: SplitLast,
        A::Init: IntoEntry<K, V>,
        A::Last: FnOnce(&K, &mut V),
    {
        let (init, f) = args.split_last();
        let (key, value) = init.into_entry();
        self.upsert(key, value, |_, _| {}, f)
    }

    pub fn emplace_or_cvisit<A>(&self, args: A) -> Result<bool, TableError>
    where
        A: SplitLast,
        A::Init: IntoEntry<K, V>,
        A::Last: FnOnce(&K, &V),
    {
        let (init, f) = args.split_last();
        let (key, value) = init.into_entry();
        self.upsert(key, value, |_, _| {}, |k, v| f(k, &*v))
    }

    /// Bundle `(entry args.., on_inserted, on_existing)`: exactly one of the
    /// two visitors runs, on the freshly inserted or the existing entry.
    pub fn emplace_and_visit<A>(&self, args: A) -> Result<bool, TableError>
    where
        A: SplitLastTwo,
        A::Init: IntoEntry<K, V>,
        A::Penultimate: FnOnce(&K, &mut V),
        A::Last: FnOnce(&K, &mut V),
    {
        let (init, on_inserted, on_existing) = args.split_last_two();
        let (key, value) = init.into_entry();
        self.upsert(key, value, on_inserted, on_existing)
    }

    pub fn emplace_and_cvisit<A>(&self, args: A) -> Result<bool, TableError>
    where
        A: SplitLastTwo,
        A::Init: IntoEntry<K, V>,
        A::Penultimate: FnOnce(&K, &V),
        A::Last: FnOnce(&K, &V),
    {
        let (init, on_inserted, on_existing) = args.split_last_two();
        let (key, value) = init.into_entry();
        self.upsert(
            key,
            value,
            |k, v| on_inserted(k, &*v),
            |k, v| on_existing(k, &*v),
        )
    }

    // `key` and `value` are dropped after the guards when unused.
    fn upsert<FI, FE>(
        &self,
        key: K,
        value: V,
        on_inserted: FI,
        on_existing: FE,
    ) -> Result<bool, TableError>
    where
        FI: FnOnce(&K, &mut V),
        FE: FnOnce(&K, &mut V),
    {
        let hash = self.hash_of(&key);
        let layout = self.read_layout();
        let mut storage = layout.partition(hash).write();
        if let Some(e) = storage.find_mut(hash, &key) {
            on_existing(&e.key, &mut e.value);
            return Ok(false);
        }
        storage.try_reserve(1)?;
        let e = storage.insert_unique(hash, key, value);
        on_inserted(&e.key, &mut e.value);
        Ok(true)
    }

    /// Remove and return the entry for `key`.
    pub fn remove<Q>(&self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(key);
        let layout = self.read_layout();
        let mut storage = layout.partition(hash).write();
        let removed = storage.remove(hash, key);
        drop(storage);
        drop(layout);
        removed
    }

    /// Remove the entry for `key`; returns whether one was removed.
    pub fn erase<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove(key).is_some()
    }

    /// Remove the entry for `key` if `pred` accepts it.
    pub fn erase_if<Q, P>(&self, key: &Q, pred: P) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        P: FnOnce(&K, &V) -> bool,
    {
        let hash = self.hash_of(key);
        let layout = self.read_layout();
        let mut storage = layout.partition(hash).write();
        let removed = storage.remove_if(hash, key, pred);
        drop(storage);
        drop(layout);
        removed.is_some()
    }

    /// Visit the entries for many keys, read-only. Returns how many keys
    /// were found.
    ///
    /// Keys are processed in chunks: each chunk is hashed up front through
    /// a clone of the iterator, the partitions it touches are locked once
    /// each in ascending order, and then the chunk is probed.
    pub fn cvisit_many<'q, Q, I, F>(&self, keys: I, mut f: F) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
        I: IntoIterator<Item = &'q Q>,
        I::IntoIter: ForwardIterator,
        F: FnMut(&K, &V),
    {
        let layout = self.read_layout();
        self.visit_chunks(&layout, keys.into_iter(), Partition::read, |storage, hash, q| {
            match storage.find(hash, q) {
                Some(e) => {
                    f(&e.key, &e.value);
                    true
                }
                None => false,
            }
        })
    }

    /// Mutable counterpart of [`cvisit_many`](Self::cvisit_many).
    pub fn visit_many<'q, Q, I, F>(&self, keys: I, mut f: F) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + 'q,
        I: IntoIterator<Item = &'q Q>,
        I::IntoIter: ForwardIterator,
        F: FnMut(&K, &mut V),
    {
        let layout = self.read_layout();
        self.visit_chunks(&layout, keys.into_iter(), Partition::write, |storage, hash, q| {
            match storage.find_mut(hash, q) {
                Some(e) => {
                    f(&e.key, &mut e.value);
                    true
                }
                None => false,
            }
        })
    }

    fn visit_chunks<'l, 'q, Q, It, G, L, P>(
        &self,
        layout: &'l Layout<K, V>,
        mut keys: It,
        lock: L,
        mut probe: P,
    ) -> usize
    where
        Q: ?Sized + Hash + 'q,
        It: Iterator<Item = &'q Q> + Clone,
        L: Fn(&'l Partition<K, V>) -> G,
        P: FnMut(&mut G, u64, &'q Q) -> bool,
    {
        let mut chunk = [(0usize, 0u64); BULK_CHUNK];
        let mut guards: Vec<(usize, G)> = Vec::with_capacity(BULK_CHUNK);
        let mut hits = 0;
        loop {
            let mut n = 0;
            for (slot, q) in chunk.iter_mut().zip(keys.clone()) {
                let hash = self.hash_of(q);
                *slot = (layout.index_of(hash), hash);
                n += 1;
            }
            if n == 0 {
                break;
            }

            let mut order = [0usize; BULK_CHUNK];
            for (o, &(part, _)) in order.iter_mut().zip(&chunk[..n]) {
                *o = part;
            }
            let order = &mut order[..n];
            order.sort_unstable();
            for &part in order.iter() {
                if !matches!(guards.last(), Some(&(p, _)) if p == part) {
                    guards.push((part, lock(layout.at(part))));
                }
            }

            for (q, &(part, hash)) in keys.by_ref().take(n).zip(&chunk[..n]) {
                if probe(locked(&mut guards, part), hash, q) {
                    hits += 1;
                }
            }
            guards.clear();
        }
        hits
    }
}

fn locked<G>(guards: &mut [(usize, G)], part: usize) -> &mut G {
    match guards.binary_search_by_key(&part, |&(p, _)| p) {
        Ok(i) => &mut guards[i].1,
        Err(_) => unreachable!("partition {part} was not locked for this chunk"),
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for PartitionedHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = self.read_layout();
        let mut out = f.debug_map();
        for p in layout.iter() {
            p.read().for_each(|k, v| {
                out.entry(k, v);
            });
        }
        out.finish()
    }
}

/// Builder for [`PartitionedHashMap`].
///
/// ```
/// use partitioned_hashmap::PartitionedHashMap;
///
/// let map: PartitionedHashMap<u64, String> = PartitionedHashMap::builder()
///     .partitions(16)
///     .capacity(1_000)
///     .build()
///     .unwrap();
/// assert_eq!(map.partition_count(), 16);
/// assert!(map.capacity() >= 1_000);
/// ```
pub struct PartitionedHashMapBuilder<K, V, S = RandomState> {
    partitions: usize,
    capacity: usize,
    hasher: S,
    _entries: PhantomData<fn() -> (K, V)>,
}

impl<K, V> PartitionedHashMapBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            partitions: DEFAULT_PARTITIONS,
            capacity: 0,
            hasher: RandomState::new(),
            _entries: PhantomData,
        }
    }
}

impl<K, V> Default for PartitionedHashMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> PartitionedHashMapBuilder<K, V, S> {
    /// Number of partitions: a power of two up to
    /// [`MAX_PARTITIONS`](crate::MAX_PARTITIONS). Checked by `build`.
    pub fn partitions(mut self, count: usize) -> Self {
        self.partitions = count;
        self
    }

    /// Total entries to make room for, spread evenly across partitions.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn hasher<T>(self, hasher: T) -> PartitionedHashMapBuilder<K, V, T> {
        PartitionedHashMapBuilder {
            partitions: self.partitions,
            capacity: self.capacity,
            hasher,
            _entries: PhantomData,
        }
    }

    pub fn build(self) -> Result<PartitionedHashMap<K, V, S>, TableError> {
        let count = check_partition_count(self.partitions)?;
        let mut sizes = Vec::new();
        sizes.try_reserve_exact(count)?;
        sizes.resize(count, self.capacity.div_ceil(count));
        let layout = Layout::try_with_capacities(&sizes)?;
        Ok(PartitionedHashMap::from_parts(self.hasher, layout))
    }
}

impl<K, V, S> fmt::Debug for PartitionedHashMapBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionedHashMapBuilder")
            .field("partitions", &self.partitions)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
