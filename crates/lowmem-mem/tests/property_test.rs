//! Property-style sweeps over the pool allocator.
//!
//! A small deterministic generator drives long alloc/realloc/free sequences
//! against the default table and checks invariants after every step:
//! entries never overlap, contents survive reallocation and counters match
//! the live set. No external fuzzing infrastructure is needed.
//!
//! Run with: `cargo test --test property_test`

use std::ptr::NonNull;

use lowmem_mem::{Config, Error, HeapSet, LowMemContext, PoolDescriptor, PoolTable};

/// xorshift64*, enough to make sequences varied and reproducible.
struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

struct Block {
    ptr: NonNull<u8>,
    len: usize,
    fill: u8,
}

fn write_fill(block: &Block) {
    unsafe { block.ptr.as_ptr().write_bytes(block.fill, block.len) };
}

fn check_fill(block: &Block) {
    let bytes = unsafe { std::slice::from_raw_parts(block.ptr.as_ptr(), block.len) };
    assert!(
        bytes.iter().all(|&b| b == block.fill),
        "block at {:p} was overwritten",
        block.ptr
    );
}

// ============================================================================
// Allocation sequences
// ============================================================================

#[test]
fn test_random_sequences_keep_blocks_intact() {
    for seed in [1u64, 7, 42, 0xDEAD_BEEF] {
        let mut heaps = HeapSet::new(PoolTable::default_table(), 1).unwrap();
        let mut rng = Rng(seed);
        let mut live: Vec<Block> = Vec::new();

        for step in 0..4000 {
            match rng.below(3) {
                0 | 1 => {
                    let len = 1 + rng.below(600);
                    if let Some(ptr) = heaps.alloc(len) {
                        assert!(heaps.usable_size(ptr.as_ptr()).unwrap() >= len);
                        let block = Block { ptr, len, fill: step as u8 };
                        write_fill(&block);
                        live.push(block);
                    }
                }
                _ if !live.is_empty() => {
                    let block = live.swap_remove(rng.below(live.len()));
                    check_fill(&block);
                    heaps.free(block.ptr.as_ptr()).unwrap();
                }
                _ => {}
            }
            assert_eq!(heaps.report().in_use(), live.len());
        }

        for block in &live {
            check_fill(block);
        }
        for block in live {
            heaps.free(block.ptr.as_ptr()).unwrap();
        }
        assert_eq!(heaps.report().in_use(), 0);
    }
}

#[test]
fn test_realloc_preserves_contents() {
    let mut heaps = HeapSet::new(PoolTable::default_table(), 1).unwrap();
    let mut rng = Rng(99);

    for _ in 0..500 {
        let len = 1 + rng.below(200);
        let ptr = heaps.alloc(len).unwrap();
        let block = Block { ptr, len, fill: len as u8 };
        write_fill(&block);

        let grown = 1 + rng.below(2000);
        let Some(new) = heaps.realloc(ptr.as_ptr(), grown).unwrap() else {
            heaps.free(ptr.as_ptr()).unwrap();
            continue;
        };
        check_fill(&Block {
            ptr: new,
            len: len.min(grown),
            fill: block.fill,
        });
        assert!(heaps.usable_size(new.as_ptr()).unwrap() >= grown);
        heaps.free(new.as_ptr()).unwrap();
    }
    assert_eq!(heaps.report().in_use(), 0);
}

#[test]
fn test_high_water_tracks_peak() {
    const TABLE: &[PoolDescriptor] = &[PoolDescriptor::new(32, 16, false, 0)];
    let mut heaps = HeapSet::new(PoolTable::new(TABLE), 1).unwrap();

    let mut live = Vec::new();
    for peak in [3usize, 9, 5, 16, 2] {
        while live.len() < peak {
            live.push(heaps.alloc(32).unwrap());
        }
        while live.len() > peak / 2 {
            heaps.free(live.pop().unwrap().as_ptr()).unwrap();
        }
    }

    let stats = heaps.stats();
    assert_eq!(stats[0].high_water, 16);
}

#[test]
fn test_borrow_chain_stops_at_non_borrowing_pool() {
    const TABLE: &[PoolDescriptor] = &[
        PoolDescriptor::new(8, 1, true, 0),
        PoolDescriptor::new(16, 1, true, 0),
        PoolDescriptor::new(32, 1, false, 0),
        PoolDescriptor::new(64, 1, false, 0),
    ];
    let mut heaps = HeapSet::new(PoolTable::new(TABLE), 1).unwrap();

    let mut sizes = Vec::new();
    while let Some(ptr) = heaps.alloc(4) {
        sizes.push(heaps.usable_size(ptr.as_ptr()).unwrap());
    }
    assert_eq!(sizes, [8, 16, 32]);

    let stats = heaps.stats();
    assert_eq!(stats[1].borrowed, 1);
    assert_eq!(stats[2].borrowed, 1);
    assert_eq!(stats[3].in_use, 0);
}

#[test]
fn test_foreign_and_interior_pointers_are_rejected() {
    let mut heaps = HeapSet::new(PoolTable::default_table(), 1).unwrap();
    let ptr = heaps.alloc(64).unwrap();

    let interior = ptr.as_ptr().wrapping_add(4);
    assert!(matches!(heaps.free(interior), Err(Error::InvalidPointer { .. })));

    let mut outside = 0u64;
    assert!(matches!(
        heaps.free((&raw mut outside).cast()),
        Err(Error::InvalidPointer { .. })
    ));
    assert!(!heaps.contains((&raw const outside).cast()));

    heaps.free(ptr.as_ptr()).unwrap();
    heaps.free(std::ptr::null_mut()).unwrap();
}

// ============================================================================
// Context
// ============================================================================

#[test]
fn test_context_compresses_every_allocation() {
    let mut ctx = LowMemContext::new(PoolTable::default_table(), &Config::default()).unwrap();
    let mut rng = Rng(3);
    let mut live = Vec::new();

    for _ in 0..1000 {
        let Some(ptr) = ctx.alloc(1 + rng.below(300)) else {
            break;
        };
        let code = ctx.compress(ptr.as_ptr());
        assert_eq!(ctx.decompress(code), ptr.as_ptr());
        live.push(code);
    }

    for code in live {
        ctx.free(ctx.decompress(code)).unwrap();
    }
    assert_eq!(ctx.report().in_use(), 0);
}
