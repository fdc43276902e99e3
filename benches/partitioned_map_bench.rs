use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use partitioned_hashmap::PartitionedHashMap;
use std::thread;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled(n: usize, seed: u64) -> (PartitionedHashMap<String, u64>, Vec<String>) {
    let m = PartitionedHashMap::new();
    let keys: Vec<_> = lcg(seed).take(n).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        m.insert(k.clone(), i as u64).unwrap();
    }
    (m, keys)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("partitioned_map_insert_10k", |b| {
        b.iter_batched(
            || PartitionedHashMap::<String, u64>::new(),
            |m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("partitioned_map_get_hit", |b| {
        let (m, keys) = filled(20_000, 7);
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("partitioned_map_get_miss", |b| {
        let (m, _) = filled(10_000, 11);
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(m.contains_key(&k));
        })
    });
}

// Same 64 lookups, one lock per key versus one lock per touched partition.
fn bench_bulk_vs_single(c: &mut Criterion) {
    let (m, keys) = filled(20_000, 3);
    let batch: Vec<String> = keys.iter().step_by(97).take(64).cloned().collect();
    let mut group = c.benchmark_group("partitioned_map_64_lookups");
    group.bench_function("cvisit_each", |b| {
        b.iter(|| {
            let mut sum = 0;
            for k in &batch {
                m.cvisit(k, |_, v| sum += *v);
            }
            black_box(sum)
        })
    });
    group.bench_function("cvisit_many", |b| {
        b.iter(|| {
            let mut sum = 0;
            m.cvisit_many(&batch, |_, v| sum += *v);
            black_box(sum)
        })
    });
    group.finish();
}

// Upserts on a shared key set from several threads at once.
fn bench_parallel_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("partitioned_map_parallel_upsert");
    for threads in [1u64, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &n| {
            let m: PartitionedHashMap<u64, u64> = PartitionedHashMap::new();
            b.iter(|| {
                thread::scope(|s| {
                    for t in 0..n {
                        let m = &m;
                        s.spawn(move || {
                            for x in lcg(t).take(2_000) {
                                m.insert_or_visit(x % 4_096, 1, |_, v| *v += 1).unwrap();
                            }
                        });
                    }
                });
            })
        });
    }
    group.finish();
}

fn bench_repartition(c: &mut Criterion) {
    c.bench_function("partitioned_map_repartition_20k", |b| {
        let (m, _) = filled(20_000, 5);
        let mut wide = false;
        b.iter(|| {
            wide = !wide;
            m.repartition(if wide { 256 } else { 16 }).unwrap();
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_bulk_vs_single,
        bench_parallel_upsert, bench_repartition
}
criterion_main!(benches);
