//! partitioned-hashmap: a concurrent hash map split into partitions, each
//! guarded by a word-sized reader/writer spin lock.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: share one open-addressing table between threads with locking
//!   granular enough that operations on different keys rarely meet, and a
//!   protocol simple enough to check by reading.
//! - Layers:
//!   - RawRwSpinLock: one `u32` of state (exclusive bit, writer-pending
//!     bit, reader count) with a graduated backoff. Exposed through
//!     `lock_api`, so `RwSpinLock<T>` and its guards come for free.
//!   - Storage<K, V>: a single-threaded Swiss table (hashbrown) whose
//!     entries carry their hash.
//!   - Layout<K, V>: a power-of-two array of partitions, one lock plus one
//!     storage each, and the hash-to-partition mapping.
//!   - PartitionedHashMap<K, V, S>: the public container. Owns the hasher
//!     and the layout behind a second `RwSpinLock`.
//!
//! Locking protocol
//! - Every operation hashes its key before taking any lock.
//! - Every operation takes the layout lock shared, then partition locks:
//!   one for single-key operations (shared to read, exclusive to write),
//!   several for bulk and whole-table operations, always in ascending
//!   partition index and each at most once.
//! - `repartition` and `reserve` take the layout lock exclusively. That is
//!   the global exclusive phase: it waits for in-flight operations to drain
//!   and then owns `&mut Layout`, so partitions are reached through
//!   `get_mut` and no partition lock is taken at all.
//! - Locks are never upgraded and never taken recursively.
//!
//! Constraints
//! - Visitors run inside the locked section. They must not call back into
//!   a partition their thread already holds; debug builds detect this with
//!   a thread-local registry (`held`) and panic instead of spinning.
//! - User `Hash` runs with no lock held. User `Eq` runs under a partition
//!   lock. `Drop` of keys and values leaving the table runs after the locks
//!   are released (except inside `retain` and `par_retain`).
//! - Entries are never rehashed through `K: Hash` after insertion; growth
//!   and migration use the stored hash.
//!
//! Static contracts
//! - Visitor reference kind (`&V` vs `&mut V`) and bulk key iterators
//!   (multi-pass, `K: Borrow<Q>`) are expressed as trait bounds, so misuse
//!   is a compile error. See [`contracts`].
//! - Parallel whole-table visitors (`par_*`, feature `rayon`) take
//!   `Fn + Sync + Send` callbacks, since several workers call them at once.
//! - `emplace_*` operations take tuples whose trailing visitors are located
//!   by rotating them to the front ([`rotate_right`]).
//!
//! Failure semantics
//! - Allocation failure surfaces as [`TableError::CapacityExhausted`] with
//!   the table unchanged and every lock released.
//! - A panicking visitor unwinds through the guards, which release their
//!   locks; the partition is left in whatever state the visitor produced.
//!
//! Notes and non-goals
//! - The spin lock is not fair: the writer-pending bit is a hint and does
//!   not hold back new readers.
//! - No iterators that outlive a locked section; use the visit family.
//! - No persistence, no serialization, no lock-free reads.

mod backoff;
mod construct;
pub mod contracts;
mod error;
mod held;
mod map;
mod partition;
mod partitioned_map_proptest;
mod rotate;
mod rw_spinlock;
mod storage;

// Public surface
pub use construct::{Construct, IntoEntry, Piecewise};
pub use contracts::{ForwardIterator, SplitLast, SplitLastTwo};
pub use error::TableError;
pub use map::{PartitionedHashMap, PartitionedHashMapBuilder};
pub use partition::{DEFAULT_PARTITIONS, MAX_PARTITIONS};
pub use rotate::{rotate_right, RotateRight};
pub use rw_spinlock::{RawRwSpinLock, RwSpinLock, RwSpinLockReadGuard, RwSpinLockWriteGuard};
