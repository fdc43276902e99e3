//! Storage: the slot table owned by one partition.
//!
//! A plain single-threaded Swiss table; all synchronization happens one
//! level up. Each entry keeps the hash computed at insertion so that growth
//! and migration never call back into `K: Hash`. Only `Eq` (via `Borrow`)
//! runs while a partition is locked.

use crate::error::TableError;
use core::borrow::Borrow;
use hashbrown::HashTable;

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
}

#[inline]
fn stored_hash<K, V>(e: &Entry<K, V>) -> u64 {
    e.hash
}

#[derive(Debug)]
pub(crate) struct Storage<K, V> {
    table: HashTable<Entry<K, V>>,
}

impl<K, V> Default for Storage<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Storage<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }

    /// Empty storage able to hold `capacity` entries without growing.
    pub(crate) fn try_with_capacity(capacity: usize) -> Result<Self, TableError> {
        let mut s = Self::new();
        s.try_reserve(capacity)?;
        Ok(s)
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), TableError> {
        self.table.try_reserve(additional, stored_hash)?;
        Ok(())
    }

    pub(crate) fn find<Q>(&self, hash: u64, q: &Q) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.table
            .find(hash, |e| e.hash == hash && e.key.borrow() == q)
    }

    pub(crate) fn find_mut<Q>(&mut self, hash: u64, q: &Q) -> Option<&mut Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.table
            .find_mut(hash, |e| e.hash == hash && e.key.borrow() == q)
    }

    /// Insert an entry known to be absent.
    ///
    /// Call `try_reserve(1)` first: growing here cannot report failure.
    pub(crate) fn insert_unique(&mut self, hash: u64, key: K, value: V) -> &mut Entry<K, V> {
        debug_assert!(self.table.capacity() > self.table.len());
        self.table
            .insert_unique(hash, Entry { hash, key, value }, stored_hash)
            .into_mut()
    }

    /// Re-home an entry during migration. Capacity must already be reserved.
    pub(crate) fn push_migrated(&mut self, entry: Entry<K, V>) {
        debug_assert!(self.table.capacity() > self.table.len());
        self.table.insert_unique(entry.hash, entry, stored_hash);
    }

    pub(crate) fn remove<Q>(&mut self, hash: u64, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.remove_if(hash, q, |_, _| true)
    }

    /// Remove the entry for `q` if `pred` accepts it.
    pub(crate) fn remove_if<Q, P>(&mut self, hash: u64, q: &Q, pred: P) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        P: FnOnce(&K, &V) -> bool,
    {
        let slot = self
            .table
            .find_entry(hash, |e| e.hash == hash && e.key.borrow() == q)
            .ok()?;
        let e = slot.get();
        if !pred(&e.key, &e.value) {
            return None;
        }
        let (e, _) = slot.remove();
        Some((e.key, e.value))
    }

    /// Keep entries for which `keep` returns true; returns how many were removed.
    pub(crate) fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let before = self.table.len();
        self.table.retain(|e| keep(&e.key, &mut e.value));
        before - self.table.len()
    }

    pub(crate) fn for_each<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &V),
    {
        for e in self.table.iter() {
            f(&e.key, &e.value);
        }
        self.table.len()
    }

    pub(crate) fn for_each_mut<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&K, &mut V),
    {
        for e in self.table.iter_mut() {
            f(&e.key, &mut e.value);
        }
        self.table.len()
    }

    /// Stored hashes of all entries, in table order.
    pub(crate) fn hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.table.iter().map(|e| e.hash)
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Entry<K, V>> + '_ {
        self.table.drain()
    }
}
