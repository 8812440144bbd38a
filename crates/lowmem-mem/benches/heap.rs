//! Pool heap benchmarks.
//!
//! Measures allocation against the default low-memory table:
//! - alloc/free pairs per size class
//! - filling a pool until it borrows from the next one
//! - pointer compression round trips

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lowmem_mem::{HeapSet, PoolDescriptor, PoolTable};

fn bench_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free");
    let mut heaps = HeapSet::new(PoolTable::default_table(), 1).unwrap();

    for size in [8, 64, 512, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let ptr = heaps.alloc(black_box(size)).unwrap();
                heaps.free(ptr.as_ptr()).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_borrow(c: &mut Criterion) {
    const TABLE: &[PoolDescriptor] = &[
        PoolDescriptor::new(16, 64, true, 0),
        PoolDescriptor::new(32, 64, true, 0),
        PoolDescriptor::new(64, 64, false, 0),
    ];

    c.bench_function("fill_with_borrowing", |b| {
        let mut heaps = HeapSet::new(PoolTable::new(TABLE), 1).unwrap();
        let mut live = Vec::with_capacity(192);
        b.iter(|| {
            while let Some(ptr) = heaps.alloc(black_box(12)) {
                live.push(ptr);
            }
            for ptr in live.drain(..) {
                heaps.free(ptr.as_ptr()).unwrap();
            }
        });
    });
}

fn bench_compress(c: &mut Criterion) {
    let mut heaps = HeapSet::new(PoolTable::default_table(), 1).unwrap();
    let compressor = heaps.compressor(0).unwrap();
    let ptrs: Vec<_> = (0..10).filter_map(|_| heaps.alloc(24)).collect();

    c.bench_function("compress_round_trip", |b| {
        b.iter(|| {
            for ptr in &ptrs {
                let code = compressor.compress(black_box(ptr.as_ptr()));
                black_box(compressor.decompress(code));
            }
        });
    });
}

criterion_group!(benches, bench_alloc_free, bench_borrow, bench_compress);
criterion_main!(benches);
