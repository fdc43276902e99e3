//! Partitions and the locking discipline around them.
//!
//! A table is a fixed, power-of-two number of partitions. Each partition
//! owns one [`RwSpinLock`] around its [`Storage`] for its whole life, and
//! that storage is never touched outside the lock.
//!
//! Rules:
//! - Single-key reads take one partition shared; single-key writes take one
//!   partition exclusive.
//! - Anything holding several partitions at once takes them in ascending
//!   index order and each at most once.
//! - Nothing upgrades shared to exclusive in place.

use crate::error::TableError;
use crate::held::{self, Held, Mode};
use crate::rw_spinlock::{RwSpinLock, RwSpinLockReadGuard, RwSpinLockWriteGuard};
use crate::storage::Storage;

/// Largest supported partition count.
pub const MAX_PARTITIONS: usize = 1 << 16;

/// Partition count used when none is configured.
pub const DEFAULT_PARTITIONS: usize = 64;

/// Hash bits `PARTITION_SHIFT..PARTITION_SHIFT + 16` select the partition.
/// The Swiss table inside a partition uses the low bits for the bucket
/// position and the top seven for its control tag, so these stay disjoint.
const PARTITION_SHIFT: u32 = 40;

pub(crate) type SharedPartition<'a, K, V> = Held<RwSpinLockReadGuard<'a, Storage<K, V>>>;
pub(crate) type ExclusivePartition<'a, K, V> = Held<RwSpinLockWriteGuard<'a, Storage<K, V>>>;

pub(crate) struct Partition<K, V> {
    storage: RwSpinLock<Storage<K, V>>,
}

impl<K, V> Partition<K, V> {
    fn with_storage(storage: Storage<K, V>) -> Self {
        Self {
            storage: RwSpinLock::new(storage),
        }
    }

    #[inline]
    pub(crate) fn read(&self) -> SharedPartition<'_, K, V> {
        let token = held::enter(&self.storage, Mode::Shared);
        Held::new(token, self.storage.read())
    }

    #[inline]
    pub(crate) fn write(&self) -> ExclusivePartition<'_, K, V> {
        let token = held::enter(&self.storage, Mode::Exclusive);
        Held::new(token, self.storage.write())
    }

    /// Direct access when exclusivity is already proven by `&mut`.
    #[inline]
    pub(crate) fn get_mut(&mut self) -> &mut Storage<K, V> {
        self.storage.get_mut()
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.storage.is_locked()
    }
}

/// Validate a requested partition count.
pub(crate) fn check_partition_count(count: usize) -> Result<usize, TableError> {
    if count == 0 || count > MAX_PARTITIONS || !count.is_power_of_two() {
        return Err(TableError::InvalidPartitionCount(count));
    }
    Ok(count)
}

/// Partition that `hash` belongs to in a layout of `count` partitions.
#[inline]
pub(crate) fn index_for(hash: u64, count: usize) -> usize {
    (hash >> PARTITION_SHIFT) as usize & (count - 1)
}

/// One generation of the table: the partitions and the hash-to-index map.
pub(crate) struct Layout<K, V> {
    partitions: Box<[Partition<K, V>]>,
    mask: usize,
}

impl<K, V> Layout<K, V> {
    /// Empty layout of `count` partitions. `count` must be valid.
    pub(crate) fn new(count: usize) -> Self {
        debug_assert!(check_partition_count(count).is_ok());
        let partitions = (0..count)
            .map(|_| Partition::with_storage(Storage::new()))
            .collect();
        Self {
            partitions,
            mask: count - 1,
        }
    }

    /// Empty layout whose partitions can hold `capacities[i]` entries each
    /// without growing. All allocation happens here, fallibly.
    pub(crate) fn try_with_capacities(capacities: &[usize]) -> Result<Self, TableError> {
        let count = check_partition_count(capacities.len())?;
        let mut partitions = Vec::new();
        partitions.try_reserve_exact(count)?;
        for &cap in capacities {
            partitions.push(Partition::with_storage(Storage::try_with_capacity(cap)?));
        }
        Ok(Self {
            partitions: partitions.into_boxed_slice(),
            mask: count - 1,
        })
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.partitions.len()
    }

    #[inline]
    pub(crate) fn index_of(&self, hash: u64) -> usize {
        index_for(hash, self.mask + 1)
    }

    #[inline]
    pub(crate) fn partition(&self, hash: u64) -> &Partition<K, V> {
        &self.partitions[self.index_of(hash)]
    }

    #[inline]
    pub(crate) fn at(&self, index: usize) -> &Partition<K, V> {
        &self.partitions[index]
    }

    #[inline]
    pub(crate) fn at_mut(&mut self, index: usize) -> &mut Partition<K, V> {
        &mut self.partitions[index]
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, Partition<K, V>> {
        self.partitions.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> core::slice::IterMut<'_, Partition<K, V>> {
        self.partitions.iter_mut()
    }

    #[cfg(feature = "rayon")]
    pub(crate) fn par_partitions(&self) -> rayon::slice::Iter<'_, Partition<K, V>>
    where
        K: Send + Sync,
        V: Send + Sync,
    {
        use rayon::prelude::*;
        self.partitions[..].par_iter()
    }

    /// Shared guards on every partition, acquired in ascending order.
    pub(crate) fn lock_all_shared(&self) -> Vec<SharedPartition<'_, K, V>> {
        self.partitions.iter().map(Partition::read).collect()
    }

    /// Exclusive guards on every partition, acquired in ascending order.
    pub(crate) fn lock_all_exclusive(&self) -> Vec<ExclusivePartition<'_, K, V>> {
        self.partitions.iter().map(Partition::write).collect()
    }
}
