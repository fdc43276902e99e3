//! Static contracts for visitors, argument bundles and key iterators.
//!
//! Every table operation states, in its bounds, which reference kind its
//! visitor receives and what its key iterator must provide. A call that
//! violates a contract does not compile, so nothing is ever checked inside
//! a locked section.
//!
//! # Visitors
//!
//! Read-only operations (`cvisit`, `cvisit_many`, `insert_or_cvisit`, ...)
//! take visitors callable with `(&K, &V)`. Mutating operations (`visit`,
//! `visit_many`, `insert_or_visit`, ...) take visitors callable with
//! `(&K, &mut V)`. A visitor that expects a shared reference is rejected
//! where a mutable one is supplied:
//!
//! ```compile_fail
//! use partitioned_hashmap::PartitionedHashMap;
//!
//! let map: PartitionedHashMap<u32, u32> = PartitionedHashMap::new();
//! map.visit(&1, |_k: &u32, v: &u32| println!("{v}"));
//! ```
//!
//! and a visitor asking for mutation is never handed a read-only entry:
//!
//! ```compile_fail
//! use partitioned_hashmap::PartitionedHashMap;
//!
//! let map: PartitionedHashMap<u32, u32> = PartitionedHashMap::new();
//! map.cvisit(&1, |_k: &u32, v: &mut u32| *v += 1);
//! ```
//!
//! # Argument bundles
//!
//! `emplace_or_visit((args.., f))` finds its visitor in the last position
//! through [`SplitLast`]; `emplace_and_visit((args.., f_inserted,
//! f_existing))` finds both in the last two through [`SplitLastTwo`]. The
//! visitor positions are checked like any other visitor.
//!
//! # Key iterators
//!
//! Bulk lookups take an iterator over `&Q` that is [`ForwardIterator`]
//! (multi-pass) and whose `Q` is the key type or a type the key declares
//! transparent comparability with through `K: Borrow<Q>`. Probing a
//! `String`-keyed table with `&str` is accepted:
//!
//! ```
//! use partitioned_hashmap::PartitionedHashMap;
//!
//! let map: PartitionedHashMap<String, u32> = PartitionedHashMap::new();
//! map.insert("a".to_string(), 1).unwrap();
//! let hits = map.cvisit_many(["a", "b"].iter().copied(), |_, _| {});
//! assert_eq!(hits, 1);
//! ```
//!
//! An unrelated element type is rejected:
//!
//! ```compile_fail
//! use partitioned_hashmap::PartitionedHashMap;
//!
//! let map: PartitionedHashMap<String, u32> = PartitionedHashMap::new();
//! let keys = [1u64, 2, 3];
//! map.cvisit_many(keys.iter(), |_, _| {});
//! ```
//!
//! and so is a single-pass iterator:
//!
//! ```compile_fail
//! use partitioned_hashmap::PartitionedHashMap;
//! use std::sync::mpsc;
//!
//! let map: PartitionedHashMap<String, u32> = PartitionedHashMap::new();
//! let (tx, rx) = mpsc::channel::<&'static str>();
//! tx.send("a").unwrap();
//! map.cvisit_many(rx.try_iter(), |_, _| {});
//! ```
//!
//! # Parallel visitation
//!
//! `par_cvisit_all`, `par_visit_all` and `par_retain` (feature `rayon`)
//! run the callback on several worker threads at once, each holding a
//! different partition. Their callbacks are bounded `Fn + Sync + Send`,
//! which admits shared atomics:
//!
//! ```
//! use partitioned_hashmap::PartitionedHashMap;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let map: PartitionedHashMap<u32, u32> = PartitionedHashMap::new();
//! map.insert(1, 1).unwrap();
//! let seen = AtomicUsize::new(0);
//! map.par_cvisit_all(|_, _| {
//!     seen.fetch_add(1, Ordering::Relaxed);
//! });
//! assert_eq!(seen.into_inner(), 1);
//! ```
//!
//! while a callback that is not safe to share between threads is rejected:
//!
//! ```compile_fail
//! use partitioned_hashmap::PartitionedHashMap;
//! use std::cell::Cell;
//!
//! let map: PartitionedHashMap<u32, u32> = PartitionedHashMap::new();
//! let seen = Cell::new(0);
//! map.par_cvisit_all(|_, _| seen.set(seen.get() + 1));
//! ```
//!
//! and so is one that needs exclusive access to its own state:
//!
//! ```compile_fail
//! use partitioned_hashmap::PartitionedHashMap;
//!
//! let map: PartitionedHashMap<u32, u32> = PartitionedHashMap::new();
//! let mut seen = 0;
//! map.par_visit_all(|_, v| {
//!     seen += 1;
//!     *v += 1;
//! });
//! ```

use crate::rotate::RotateRight;

/// An iterator that can be traversed more than once.
///
/// Bulk operations look ahead over a chunk of keys to hash them and lock
/// the partitions they touch, then walk the same chunk again to probe.
pub trait ForwardIterator: Iterator + Clone {}

impl<I: Iterator + Clone> ForwardIterator for I {}

/// Split a bundle into its leading arguments and its last element.
pub trait SplitLast {
    type Init;
    type Last;

    fn split_last(self) -> (Self::Init, Self::Last);
}

/// Split a bundle into its leading arguments and its last two elements.
pub trait SplitLastTwo {
    type Init;
    type Penultimate;
    type Last;

    fn split_last_two(self) -> (Self::Init, Self::Penultimate, Self::Last);
}

macro_rules! impl_split_last {
    ($( ($($t:ident $v:ident),*) ;)*) => {$(
        impl<$($t,)* Z> SplitLast for ($($t,)* Z,) {
            type Init = ($($t,)*);
            type Last = Z;

            #[inline(always)]
            fn split_last(self) -> (Self::Init, Z) {
                let (z, $($v,)*) = <Self as RotateRight<1>>::rotate_right(self);
                (($($v,)*), z)
            }
        }
    )*};
}

macro_rules! impl_split_last_two {
    ($( ($($t:ident $v:ident),*) ;)*) => {$(
        impl<$($t,)* Y, Z> SplitLastTwo for ($($t,)* Y, Z) {
            type Init = ($($t,)*);
            type Penultimate = Y;
            type Last = Z;

            #[inline(always)]
            fn split_last_two(self) -> (Self::Init, Y, Z) {
                let (y, z, $($v,)*) = <Self as RotateRight<2>>::rotate_right(self);
                (($($v,)*), y, z)
            }
        }
    )*};
}

impl_split_last! {
    ();
    (A a);
    (A a, B b);
    (A a, B b, C c);
    (A a, B b, C c, D d);
    (A a, B b, C c, D d, E e);
}

impl_split_last_two! {
    ();
    (A a);
    (A a, B b);
    (A a, B b, C c);
    (A a, B b, C c, D d);
}
