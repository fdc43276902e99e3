// Re-entrant locking from inside visitors.
//
// A visitor runs with its partition locked. Calling back into the same
// partition would spin forever; debug builds panic instead. Reads nested in
// reads and calls that touch other partitions are fine.
use partitioned_hashmap::PartitionedHashMap;

fn single_partition() -> PartitionedHashMap<u32, u32> {
    let m = PartitionedHashMap::builder().partitions(1).build().unwrap();
    m.insert(1, 10).unwrap();
    m.insert(2, 20).unwrap();
    m
}

#[test]
fn nested_read_in_read_is_ok() {
    let m = single_partition();
    let mut inner = None;
    assert!(m.cvisit(&1, |_, _| inner = m.get(&2)));
    assert_eq!(inner, Some(20));
}

#[test]
fn different_tables_do_not_conflict() {
    let a = single_partition();
    let b = single_partition();
    a.visit(&1, |_, v| {
        b.visit(&1, |_, w| *w += *v);
    });
    assert_eq!(b.get(&1), Some(20));
}

#[cfg(debug_assertions)]
#[test]
fn write_inside_visit_panics_in_debug() {
    let m = single_partition();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        m.visit(&1, |_, _| {
            // Re-entering the held partition should panic in debug builds
            let _ = m.insert(3, 30);
        });
    }));
    assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    // The guards unwound cleanly.
    m.insert(3, 30).unwrap();
}

#[cfg(debug_assertions)]
#[test]
fn read_inside_visit_panics_in_debug() {
    let m = single_partition();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        m.visit(&1, |_, _| {
            let _ = m.get(&2);
        });
    }));
    assert!(res.is_err());
}

#[cfg(debug_assertions)]
#[test]
fn global_phase_inside_visitor_panics_in_debug() {
    let m = single_partition();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        m.cvisit(&1, |_, _| {
            let _ = m.repartition(2);
        });
    }));
    assert!(res.is_err());
    assert_eq!(m.partition_count(), 1);
    m.repartition(2).unwrap();
}
