//! External string store benchmarks.
//!
//! Measures the `check` path of each strategy:
//! - Flash store: first insertion (scan + append) versus repeated lookups
//!   served from the hit cache
//! - Constant table lookups, hits and misses
//! - Leak-tracking allocate/free pairs

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lowmem_mem::extstr::strings::BUILTIN_STRINGS;
use lowmem_mem::extstr::{ConstantStore, ExternalStringStore, FlashStore, LeakTrackingStore};

fn identifiers(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(|i| format!("identifier_{i}").into_bytes()).collect()
}

fn bench_flash_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("flash_insert");

    for size in [10, 100, 1_000].iter() {
        let strings = identifiers(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut store = FlashStore::default();
                for s in &strings {
                    black_box(store.check(s));
                }
            });
        });
    }

    group.finish();
}

fn bench_flash_duplicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("flash_duplicates");

    for size in [10, 100, 1_000].iter() {
        let strings = identifiers(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut store = FlashStore::default();
            for s in &strings {
                store.check(s);
            }
            b.iter(|| {
                for s in &strings {
                    black_box(store.check(s));
                }
            });
        });
    }

    group.finish();
}

fn bench_constant_lookup(c: &mut Criterion) {
    let mut store = ConstantStore::builtin();
    let hits: Vec<&[u8]> = BUILTIN_STRINGS.iter().map(|s| s.to_bytes()).collect();

    c.bench_function("constant_hits", |b| {
        b.iter(|| {
            for s in &hits {
                black_box(store.check(s));
            }
        });
    });

    let misses = identifiers(hits.len());
    c.bench_function("constant_misses", |b| {
        b.iter(|| {
            for s in &misses {
                black_box(store.check(s));
            }
        });
    });
}

fn bench_tracking_pairs(c: &mut Criterion) {
    let strings = identifiers(100);

    c.bench_function("tracking_check_free", |b| {
        let mut store = LeakTrackingStore::new();
        b.iter(|| {
            for s in &strings {
                if let Some(ptr) = store.check(black_box(s)) {
                    unsafe { store.free(ptr) };
                }
            }
        });
    });
}

criterion_group!(
    benches,
    bench_flash_insert,
    bench_flash_duplicates,
    bench_constant_lookup,
    bench_tracking_pairs
);
criterion_main!(benches);
