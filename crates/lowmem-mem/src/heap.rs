//! Pool heaps: one contiguous backing buffer per heap, carved into pools.
//!
//! [`HeapSet`] is built once at process start from a [`PoolTable`]. Every
//! heap buffer is allocated from the system allocator and holds its own
//! bookkeeping:
//!
//! ```text
//! +-------------+-------------+-----+---------+----------------+---------
//! | PoolHeader0 | PoolHeader1 | ... | padding | pool 0 entries | pool 1 ...
//! +-------------+-------------+-----+---------+----------------+---------
//! ```
//!
//! Free entries form an intrusive singly linked list per pool: the first four
//! bytes of a free entry hold the heap offset of the next free entry.
//!
//! # Allocation
//!
//! A request is served by the smallest pool whose entries fit. When that pool
//! is exhausted and its `borrow` flag is set, the next larger pool is tried,
//! and so on while the pool being left allows borrowing.
//!
//! # Examples
//!
//! ```
//! use lowmem_mem::{HeapSet, PoolDescriptor, PoolTable};
//!
//! const POOLS: &[PoolDescriptor] = &[
//!     PoolDescriptor::new(16, 2, true, 0),
//!     PoolDescriptor::new(64, 2, false, 0),
//! ];
//!
//! let mut heaps = HeapSet::new(PoolTable::new(POOLS), 1).unwrap();
//!
//! let a = heaps.alloc(10).unwrap();
//! let b = heaps.alloc(16).unwrap();
//! // The 16-byte pool is empty now, so this one borrows a 64-byte entry.
//! let c = heaps.alloc(12).unwrap();
//! assert_eq!(heaps.usable_size(c.as_ptr()), Ok(64));
//!
//! for p in [a, b, c] {
//!     heaps.free(p.as_ptr()).unwrap();
//! }
//! ```

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::{self, NonNull};

use lowmem_log::{debug, error, info, warn};

use crate::compress::PointerCompressor;
use crate::error::{Error, Result};
use crate::pool::{
    HEAP_ALIGNMENT, POOL_HEADER_SIZE, PoolDescriptor, PoolTable, WORD_ALIGNMENT,
    heap_overhead,
};

/// Terminates a free list.
const FREE_END: u32 = u32::MAX;

/// Per-pool bookkeeping stored at the start of the heap buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct PoolHeader {
    /// Heap offset of the first free entry, or `FREE_END`.
    free_head: u32,
    /// Entries currently handed out.
    in_use: u32,
    /// Largest `in_use` ever observed.
    high_water: u32,
    /// Requests served here because a smaller pool was exhausted.
    borrowed: u32,
}

const _: () = assert!(size_of::<PoolHeader>() == POOL_HEADER_SIZE);

/// Where a pool lives inside its heap.
#[derive(Debug, Clone, Copy)]
struct PoolLayout {
    desc: PoolDescriptor,
    header_offset: usize,
    data_offset: usize,
}

impl PoolLayout {
    const fn data_end(&self) -> usize {
        self.data_offset + self.desc.bytes()
    }
}

/// One backing buffer.
struct Heap {
    base: NonNull<u8>,
    layout: Layout,
}

/// Usage counters of a single pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub entry_size: usize,
    pub entry_count: usize,
    pub borrow: bool,
    pub heap_index: usize,
    /// Entries currently allocated.
    pub in_use: usize,
    /// Highest simultaneous `in_use`.
    pub high_water: usize,
    /// Requests this pool served on behalf of smaller, exhausted pools.
    pub borrowed: usize,
}

/// Snapshot of every heap and pool, rendered as a table by `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapReport {
    /// Backing buffer size per heap.
    pub heap_sizes: Vec<usize>,
    /// Pool counters in pool table order.
    pub pools: Vec<PoolStats>,
}

impl HeapReport {
    /// Total entries currently allocated across all pools.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.pools.iter().map(|p| p.in_use).sum()
    }
}

impl fmt::Display for HeapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (heap, size) in self.heap_sizes.iter().enumerate() {
            writeln!(f, "heap {heap}: {size} bytes")?;
            writeln!(
                f,
                "  {:>6} {:>6} {:>6} {:>6} {:>8} {:>3}",
                "size", "num", "use", "hwm", "borrowed", "brw"
            )?;
            for pool in self.pools.iter().filter(|p| p.heap_index == heap) {
                writeln!(
                    f,
                    "  {:>6} {:>6} {:>6} {:>6} {:>8} {:>3}",
                    pool.entry_size,
                    pool.entry_count,
                    pool.in_use,
                    pool.high_water,
                    pool.borrowed,
                    u8::from(pool.borrow)
                )?;
            }
        }
        Ok(())
    }
}

/// The set of pool heaps described by one pool table.
///
/// Pointers returned by [`alloc`](Self::alloc) stay valid until they are
/// freed or the `HeapSet` is dropped.
pub struct HeapSet {
    heaps: Vec<Heap>,
    /// Pool layouts in pool table order.
    pools: Vec<PoolLayout>,
    /// Pool indices sorted by entry size; ties keep table order.
    by_size: Vec<usize>,
}

// SAFETY: the buffers are owned exclusively by the HeapSet and all mutation
// goes through `&mut self`.
unsafe impl Send for HeapSet {}

impl HeapSet {
    /// Sizes, allocates and initializes every heap of `table`.
    pub fn new(table: PoolTable<'_>, heap_count: usize) -> Result<Self> {
        table.validate(heap_count)?;

        let mut set = HeapSet {
            heaps: Vec::with_capacity(heap_count),
            pools: Vec::with_capacity(table.len()),
            by_size: Vec::new(),
        };

        // Lay out pools in table order, one header cursor and one data cursor
        // per heap.
        let mut header_cursor = vec![0usize; heap_count];
        let mut data_cursor: Vec<usize> = (0..heap_count)
            .map(|heap| heap_overhead(table.pools_in_heap(heap).count()))
            .collect();
        for desc in table.pools() {
            let heap = desc.heap_index;
            set.pools.push(PoolLayout {
                desc: *desc,
                header_offset: header_cursor[heap],
                data_offset: data_cursor[heap],
            });
            header_cursor[heap] += POOL_HEADER_SIZE;
            data_cursor[heap] += desc.bytes();
        }

        for heap in 0..heap_count {
            let size = table.heap_required(heap);
            debug_assert_eq!(size, data_cursor[heap]);

            let layout = Layout::from_size_align(size, HEAP_ALIGNMENT)
                .map_err(|_| Error::HeapTooLarge { heap, size })?;
            // SAFETY: size is non-zero, every validated heap owns a pool.
            let base = unsafe { alloc::alloc_zeroed(layout) };
            let base = NonNull::new(base).ok_or(Error::OutOfMemory { heap, size })?;
            set.heaps.push(Heap { base, layout });

            info!("Allocated heap {heap} of {size} bytes");
        }

        for pool in 0..set.pools.len() {
            set.init_pool(pool);
        }

        set.by_size = (0..set.pools.len()).collect();
        set.by_size.sort_by_key(|&i| set.pools[i].desc.entry_size);

        info!("Pools: {table}");
        Ok(set)
    }

    /// Process-start entry point: like [`new`](Self::new) but exits with a
    /// diagnostic when the heap cannot be created.
    #[must_use]
    pub fn init_or_exit(table: PoolTable<'_>, heap_count: usize) -> Self {
        match Self::new(table, heap_count) {
            Ok(set) => set,
            Err(err) => {
                error!("Failed to allocate heap: {err}");
                std::process::exit(1)
            }
        }
    }

    fn init_pool(&mut self, pool: usize) {
        let layout = self.pools[pool];
        let base = self.heaps[layout.desc.heap_index].base.as_ptr();
        let size = layout.desc.entry_size;

        for i in 0..layout.desc.entry_count {
            let offset = layout.data_offset + i * size;
            let next = if i + 1 == layout.desc.entry_count {
                FREE_END
            } else {
                (offset + size) as u32
            };
            // SAFETY: offset lies inside the heap buffer and is word aligned.
            unsafe { base.add(offset).cast::<u32>().write(next) };
        }

        let header = PoolHeader {
            free_head: layout.data_offset as u32,
            in_use: 0,
            high_water: 0,
            borrowed: 0,
        };
        // SAFETY: header_offset lies inside the header area of the heap.
        unsafe {
            base.add(layout.header_offset)
                .cast::<PoolHeader>()
                .write(header);
        }
    }

    fn header_ptr(&self, pool: usize) -> *mut PoolHeader {
        let layout = &self.pools[pool];
        let base = self.heaps[layout.desc.heap_index].base.as_ptr();
        base.wrapping_add(layout.header_offset).cast()
    }

    fn header(&self, pool: usize) -> PoolHeader {
        // SAFETY: headers are initialized in `new` and stay in bounds.
        unsafe { self.header_ptr(pool).read() }
    }

    fn header_mut(&mut self, pool: usize) -> &mut PoolHeader {
        // SAFETY: exclusive access through `&mut self`; the header is
        // initialized and 4-byte aligned.
        unsafe { &mut *self.header_ptr(pool) }
    }

    fn take_entry(&mut self, pool: usize, borrowed: bool) -> Option<NonNull<u8>> {
        let base = self.heaps[self.pools[pool].desc.heap_index].base.as_ptr();
        let header = self.header_mut(pool);
        if header.free_head == FREE_END {
            return None;
        }

        let entry = base.wrapping_add(header.free_head as usize);
        // SAFETY: free_head always names a free entry of this pool.
        header.free_head = unsafe { entry.cast::<u32>().read() };
        header.in_use += 1;
        header.high_water = header.high_water.max(header.in_use);
        if borrowed {
            header.borrowed += 1;
        }

        NonNull::new(entry)
    }

    /// Allocates `size` bytes, or returns `None` when no pool can serve it.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        let first = self
            .by_size
            .iter()
            .position(|&p| self.pools[p].desc.entry_size >= size)?;

        for rank in first..self.by_size.len() {
            let pool = self.by_size[rank];
            if let Some(ptr) = self.take_entry(pool, rank > first) {
                if rank > first {
                    debug!(
                        "alloc({size}) borrowed from pool of {} bytes",
                        self.pools[pool].desc.entry_size
                    );
                }
                return Some(ptr);
            }
            if !self.pools[pool].desc.borrow {
                break;
            }
        }

        debug!("alloc({size}) failed: pools exhausted");
        None
    }

    /// Finds the pool owning `ptr` and the heap offset of its entry.
    fn locate(&self, ptr: *const u8) -> Result<(usize, usize)> {
        let addr = ptr.addr();
        let invalid = Error::InvalidPointer { ptr: addr };

        let (heap, offset) = self
            .heaps
            .iter()
            .enumerate()
            .find_map(|(i, h)| {
                let off = addr.checked_sub(h.base.as_ptr().addr())?;
                (off < h.layout.size()).then_some((i, off))
            })
            .ok_or(invalid.clone())?;

        let pool = self
            .pools
            .iter()
            .position(|p| {
                p.desc.heap_index == heap
                    && offset >= p.data_offset
                    && offset < p.data_end()
            })
            .ok_or(invalid.clone())?;

        let layout = &self.pools[pool];
        if (offset - layout.data_offset) % layout.desc.entry_size != 0 {
            return Err(invalid);
        }
        Ok((pool, offset))
    }

    /// Returns an entry to its pool. Null is accepted and ignored.
    ///
    /// There is no double-free detection: freeing an entry twice corrupts the
    /// pool's free list.
    pub fn free(&mut self, ptr: *mut u8) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }

        let (pool, offset) = self.locate(ptr)?;
        let header = self.header_mut(pool);
        // SAFETY: locate() proved ptr is the start of an entry of this pool.
        unsafe { ptr.cast::<u32>().write(header.free_head) };
        header.free_head = offset as u32;
        header.in_use = header.in_use.saturating_sub(1);
        Ok(())
    }

    /// Resizes an allocation.
    ///
    /// Returns `Ok(None)` when `size` is zero (the block is freed) or when no
    /// pool can hold the new size (the old block is left untouched).
    pub fn realloc(&mut self, ptr: *mut u8, size: usize) -> Result<Option<NonNull<u8>>> {
        if ptr.is_null() {
            return Ok(self.alloc(size));
        }
        if size == 0 {
            self.free(ptr)?;
            return Ok(None);
        }

        let (pool, _) = self.locate(ptr)?;
        let old_size = self.pools[pool].desc.entry_size;
        if size <= old_size {
            return Ok(NonNull::new(ptr));
        }

        let Some(new) = self.alloc(size) else {
            return Ok(None);
        };
        // SAFETY: both entries are live, distinct and at least old_size long.
        unsafe { ptr::copy_nonoverlapping(ptr, new.as_ptr(), old_size) };
        self.free(ptr)?;
        Ok(Some(new))
    }

    /// Entry size of the pool that owns `ptr`.
    pub fn usable_size(&self, ptr: *const u8) -> Result<usize> {
        let (pool, _) = self.locate(ptr)?;
        Ok(self.pools[pool].desc.entry_size)
    }

    /// Returns true if `ptr` points into one of the heap buffers.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr.addr();
        self.heaps.iter().any(|h| {
            addr.checked_sub(h.base.as_ptr().addr())
                .is_some_and(|off| off < h.layout.size())
        })
    }

    #[must_use]
    pub fn heap_count(&self) -> usize {
        self.heaps.len()
    }

    /// Start of the backing buffer of `heap`.
    pub fn heap_base(&self, heap: usize) -> Result<NonNull<u8>> {
        self.heaps
            .get(heap)
            .map(|h| h.base)
            .ok_or(Error::UnknownHeap { heap })
    }

    /// Size in bytes of the backing buffer of `heap`.
    pub fn heap_size(&self, heap: usize) -> Result<usize> {
        self.heaps
            .get(heap)
            .map(|h| h.layout.size())
            .ok_or(Error::UnknownHeap { heap })
    }

    /// A pointer compressor for `heap`.
    ///
    /// A heap too large for 16-bit codes still gets a compressor; pointers
    /// past the addressable range abort on compression.
    pub fn compressor(&self, heap: usize) -> Result<PointerCompressor> {
        let base = self.heap_base(heap)?;
        let size = self.heap_size(heap)?;
        let compressor = PointerCompressor::new(base, size, WORD_ALIGNMENT)?;
        if !compressor.covers_heap() {
            warn!(
                "Heap {heap} of {size} bytes exceeds the {} bytes addressable by 16-bit pointers",
                compressor.max_addressable()
            );
        }
        Ok(compressor)
    }

    /// Usage counters for every pool, in pool table order.
    #[must_use]
    pub fn stats(&self) -> Vec<PoolStats> {
        (0..self.pools.len())
            .map(|pool| {
                let desc = self.pools[pool].desc;
                let header = self.header(pool);
                PoolStats {
                    entry_size: desc.entry_size,
                    entry_count: desc.entry_count,
                    borrow: desc.borrow,
                    heap_index: desc.heap_index,
                    in_use: header.in_use as usize,
                    high_water: header.high_water as usize,
                    borrowed: header.borrowed as usize,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn report(&self) -> HeapReport {
        HeapReport {
            heap_sizes: self.heaps.iter().map(|h| h.layout.size()).collect(),
            pools: self.stats(),
        }
    }

    /// Logs the current pool usage at info level.
    pub fn dump(&self) {
        for line in self.report().to_string().lines() {
            info!("{line}");
        }
    }
}

impl Drop for HeapSet {
    fn drop(&mut self) {
        for heap in &self.heaps {
            // SAFETY: base was allocated in `new` with exactly this layout.
            unsafe { alloc::dealloc(heap.base.as_ptr(), heap.layout) };
        }
    }
}

impl fmt::Debug for HeapSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapSet")
            .field("heaps", &self.heaps.len())
            .field("pools", &self.pools.len())
            .finish()
    }
}
