#![cfg(test)]

// Property tests for PartitionedHashMap kept inside the crate so they can
// check partition placement, which the public API does not expose.

use crate::{PartitionedHashMap, TableError};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    InsertOrAssign(usize, i32),
    InsertOrVisit(usize, i32),
    Visit(usize, i32),
    Remove(usize),
    EraseIf(usize, i32),
    Get(usize),
    Contains(String),
    VisitMany(Vec<usize>, i32),
    Retain(i32),
    Repartition(u32),
    Clear,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=10).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::InsertOrAssign(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::InsertOrVisit(i, d)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Visit(i, d)),
            2 => idx.clone().prop_map(Op::Remove),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, t)| Op::EraseIf(i, t)),
            2 => idx.clone().prop_map(Op::Get),
            1 => "[a-z]{0,4}".prop_map(Op::Contains),
            2 => (proptest::collection::vec(idx.clone(), 0..40), any::<i32>())
                .prop_map(|(ix, d)| Op::VisitMany(ix, d)),
            1 => any::<i32>().prop_map(Op::Retain),
            1 => (0u32..=7).prop_map(Op::Repartition),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate inserts are rejected and leave the value untouched.
// - Upserts report whether the key was new and visit only existing entries.
// - Bulk visitation hits each requested present key once per occurrence.
// - Repartitioning never loses, duplicates or misplaces an entry.
// - `len`/`is_empty` and the full contents match the model after each op.
fn run<S: BuildHasher>(
    sut: PartitionedHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(()) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        model.insert(k, v);
                    }
                    Err(TableError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                    Err(e) => prop_assert!(false, "unexpected error {e}"),
                }
            }
            Op::InsertOrAssign(i, v) => {
                let k = key_from(&pool, i);
                let fresh = sut.insert_or_assign(k.clone(), v).unwrap();
                prop_assert_eq!(fresh, model.insert(k, v).is_none());
            }
            Op::InsertOrVisit(i, d) => {
                let k = key_from(&pool, i);
                let mut visited = false;
                let fresh = sut
                    .insert_or_visit(k.clone(), d, |_, v| {
                        visited = true;
                        *v = v.wrapping_add(d);
                    })
                    .unwrap();
                prop_assert_eq!(fresh, !visited);
                match model.get_mut(&k) {
                    Some(mv) => *mv = mv.wrapping_add(d),
                    None => {
                        model.insert(k, d);
                    }
                }
            }
            Op::Visit(i, d) => {
                let k = key_from(&pool, i);
                let found = sut.visit(k.0.as_str(), |_, v| *v = v.wrapping_add(d));
                match model.get_mut(&k) {
                    Some(mv) => {
                        prop_assert!(found);
                        *mv = mv.wrapping_add(d);
                    }
                    None => prop_assert!(!found),
                }
            }
            Op::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove_entry(&k));
            }
            Op::EraseIf(i, t) => {
                let k = key_from(&pool, i);
                let erased = sut.erase_if(&k, |_, v| *v < t);
                let expect = model.get(&k).is_some_and(|v| *v < t);
                prop_assert_eq!(erased, expect);
                if expect {
                    model.remove(&k);
                }
            }
            Op::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k).copied());
            }
            Op::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            Op::VisitMany(ix, d) => {
                let keys: Vec<Key> = ix.iter().map(|&i| key_from(&pool, i)).collect();
                let hits = sut.visit_many(keys.iter(), |_, v| *v = v.wrapping_add(d));
                let mut expect = 0;
                for k in &keys {
                    if let Some(mv) = model.get_mut(k) {
                        *mv = mv.wrapping_add(d);
                        expect += 1;
                    }
                }
                prop_assert_eq!(hits, expect);
            }
            Op::Retain(t) => {
                let removed = sut.retain(|_, v| *v >= t);
                let before = model.len();
                model.retain(|_, v| *v >= t);
                prop_assert_eq!(removed, before - model.len());
            }
            Op::Repartition(p) => {
                sut.repartition(1 << p).unwrap();
                prop_assert_eq!(sut.partition_count(), 1 << p);
                sut.assert_placement();
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }

    let mut contents = BTreeMap::new();
    let seen = sut.cvisit_all(|k, v| {
        contents.insert(k.clone(), *v);
    });
    prop_assert_eq!(seen, model.len());
    prop_assert_eq!(contents, model.into_iter().collect::<BTreeMap<_, _>>());
    sut.assert_placement();
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut = PartitionedHashMap::builder().partitions(4).build().unwrap();
        run(sut, pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key lands in partition
// zero and shares one hash, so probing relies entirely on `Eq`.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut = PartitionedHashMap::builder()
            .partitions(8)
            .hasher(ConstBuildHasher)
            .build()
            .unwrap();
        run(sut, pool, ops)?;
    }
}
