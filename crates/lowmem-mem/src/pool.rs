//! Pool tables: the static description of heap memory.
//!
//! A pool is a slab of equally sized entries. A [`PoolTable`] is an ordered
//! list of [`PoolDescriptor`]s which fully determines how many heaps exist,
//! how large each backing buffer is, and how it is partitioned.
//!
//! Each heap buffer starts with one [`POOL_HEADER_SIZE`]-byte header per pool
//! (free list head and usage counters), padded to 8 bytes, followed by the
//! pool entries in table order.
//!
//! # Examples
//!
//! ```
//! use lowmem_mem::pool::{PoolDescriptor, PoolTable, heap_overhead};
//!
//! const POOLS: &[PoolDescriptor] = &[
//!     PoolDescriptor::new(16, 200, true, 0),
//!     PoolDescriptor::new(1024, 6, false, 0),
//! ];
//!
//! let table = PoolTable::new(POOLS);
//! assert_eq!(table.heap_required(0), 16 * 200 + 1024 * 6 + heap_overhead(2));
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// Minimum alignment of every pool entry; also the compression granularity.
pub const WORD_ALIGNMENT: usize = 4;

/// Bytes of bookkeeping stored in the heap buffer for each pool.
pub const POOL_HEADER_SIZE: usize = 16;

/// Alignment of each heap backing buffer.
pub const HEAP_ALIGNMENT: usize = 8;

/// Smallest entry that can hold an intrusive free list link.
pub const MIN_ENTRY_SIZE: usize = 4;

/// Description of one pool: `entry_count` entries of `entry_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolDescriptor {
    /// Size of every entry in bytes.
    pub entry_size: usize,
    /// Number of entries in the pool.
    pub entry_count: usize,
    /// An exhausted pool with this flag set forwards requests to the next
    /// larger pool.
    pub borrow: bool,
    /// Heap that hosts this pool.
    pub heap_index: usize,
}

impl PoolDescriptor {
    #[must_use]
    pub const fn new(
        entry_size: usize,
        entry_count: usize,
        borrow: bool,
        heap_index: usize,
    ) -> Self {
        Self {
            entry_size,
            entry_count,
            borrow,
            heap_index,
        }
    }

    /// Bytes occupied by the pool's entries (headers excluded).
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.entry_size * self.entry_count
    }

    fn checked_bytes(&self) -> Option<usize> {
        self.entry_size.checked_mul(self.entry_count)
    }
}

impl fmt::Display for PoolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(sz:{},num:{},brw:{},idx:{})",
            self.entry_size,
            self.entry_count,
            u8::from(self.borrow),
            self.heap_index
        )
    }
}

/// Bookkeeping bytes for a heap holding `pool_count` pools.
#[must_use]
pub const fn heap_overhead(pool_count: usize) -> usize {
    let raw = pool_count * POOL_HEADER_SIZE;
    (raw + HEAP_ALIGNMENT - 1) & !(HEAP_ALIGNMENT - 1)
}

/// The low-memory pool layout used by default.
///
/// Sizes follow the allocation profile of a small interpreter heap: many
/// 16 to 40 byte objects, a single 1352-byte slot for the heap header when
/// pointer compression is on, and a handful of large buffers. Pools up to
/// 2048 bytes may borrow from their larger neighbours.
pub const DEFAULT_POOL_TABLE: &[PoolDescriptor] = &[
    PoolDescriptor::new(8, 10, true, 0),
    PoolDescriptor::new(12, 10, true, 0),
    PoolDescriptor::new(16, 200, true, 0),
    PoolDescriptor::new(20, 400, true, 0),
    PoolDescriptor::new(24, 400, true, 0),
    PoolDescriptor::new(28, 200, true, 0),
    PoolDescriptor::new(32, 200, true, 0),
    PoolDescriptor::new(40, 200, true, 0),
    PoolDescriptor::new(48, 50, true, 0),
    PoolDescriptor::new(52, 50, true, 0),
    PoolDescriptor::new(56, 50, true, 0),
    PoolDescriptor::new(60, 50, true, 0),
    PoolDescriptor::new(64, 50, true, 0),
    PoolDescriptor::new(128, 80, true, 0),
    PoolDescriptor::new(256, 16, true, 0),
    PoolDescriptor::new(512, 16, true, 0),
    PoolDescriptor::new(1024, 6, true, 0),
    PoolDescriptor::new(1352, 1, true, 0),
    PoolDescriptor::new(2048, 5, true, 0),
    PoolDescriptor::new(4096, 3, false, 0),
    PoolDescriptor::new(8192, 3, false, 0),
    PoolDescriptor::new(16384, 1, false, 0),
    PoolDescriptor::new(32768, 1, false, 0),
];

/// A borrowed, ordered sequence of pool descriptors.
#[derive(Debug, Clone, Copy)]
pub struct PoolTable<'a> {
    pools: &'a [PoolDescriptor],
}

impl<'a> PoolTable<'a> {
    #[must_use]
    pub const fn new(pools: &'a [PoolDescriptor]) -> Self {
        Self { pools }
    }

    /// The built-in [`DEFAULT_POOL_TABLE`].
    #[must_use]
    pub const fn default_table() -> PoolTable<'static> {
        PoolTable::new(DEFAULT_POOL_TABLE)
    }

    #[must_use]
    pub const fn pools(&self) -> &'a [PoolDescriptor] {
        self.pools
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.pools.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Number of heaps the table refers to (highest heap index + 1).
    #[must_use]
    pub fn heap_count(&self) -> usize {
        self.pools
            .iter()
            .map(|p| p.heap_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pools hosted by `heap`, with their positions in the table.
    pub fn pools_in_heap(
        &self,
        heap: usize,
    ) -> impl Iterator<Item = (usize, &'a PoolDescriptor)> + 'a {
        self.pools
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.heap_index == heap)
    }

    /// Exact byte size of the backing buffer for `heap`.
    ///
    /// Saturates instead of overflowing; [`PoolTable::validate`] rejects
    /// tables where that would matter.
    #[must_use]
    pub fn heap_required(&self, heap: usize) -> usize {
        let mut count = 0;
        let mut total: usize = 0;
        for (_, pool) in self.pools_in_heap(heap) {
            count += 1;
            total = total.saturating_add(pool.checked_bytes().unwrap_or(usize::MAX));
        }
        total.saturating_add(heap_overhead(count))
    }

    /// Checks the table against `heap_count` heaps.
    ///
    /// Heap offsets are stored as `u32` inside the buffers, so every heap
    /// must stay below 4 GiB.
    pub fn validate(&self, heap_count: usize) -> Result<()> {
        if self.pools.is_empty() {
            return Err(Error::EmptyPoolTable);
        }
        if heap_count == 0 {
            return Err(Error::InvalidHeapCount);
        }

        for (index, pool) in self.pools.iter().enumerate() {
            let reason = if pool.entry_size < MIN_ENTRY_SIZE {
                Some("entry size smaller than a free list link")
            } else if pool.entry_size % WORD_ALIGNMENT != 0 {
                Some("entry size is not a multiple of the word alignment")
            } else if pool.entry_count == 0 {
                Some("entry count is zero")
            } else if u32::try_from(pool.entry_count).is_err() {
                Some("entry count does not fit in 32 bits")
            } else if pool.checked_bytes().is_none() {
                Some("pool size overflows")
            } else if pool.heap_index >= heap_count {
                Some("heap index out of range")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(Error::InvalidPoolEntry { index, reason });
            }
        }

        for heap in 0..heap_count {
            if self.pools_in_heap(heap).next().is_none() {
                return Err(Error::EmptyHeap { heap });
            }
            let size = self.heap_required(heap);
            if size >= u32::MAX as usize {
                return Err(Error::HeapTooLarge { heap, size });
            }
        }

        Ok(())
    }
}

impl Default for PoolTable<'static> {
    fn default() -> Self {
        PoolTable::default_table()
    }
}

impl fmt::Display for PoolTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pool) in self.pools.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{pool}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_overhead_rounds_to_eight() {
        assert_eq!(heap_overhead(0), 0);
        assert_eq!(heap_overhead(1), 16);
        assert_eq!(heap_overhead(2), 32);
        assert_eq!(heap_overhead(23), 368);
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = PoolTable::default_table();
        assert_eq!(table.len(), 23);
        assert_eq!(table.heap_count(), 1);
        assert!(table.validate(1).is_ok());
        assert_eq!(table.heap_required(0), 181_280 + heap_overhead(23));
    }

    #[test]
    fn test_default_table_borrow_flags() {
        let borrowing: Vec<usize> = DEFAULT_POOL_TABLE
            .iter()
            .filter(|p| p.borrow)
            .map(|p| p.entry_size)
            .collect();
        assert_eq!(borrowing.last(), Some(&2048));
        assert!(!DEFAULT_POOL_TABLE.last().unwrap().borrow);
    }

    #[test]
    fn test_two_heaps() {
        let pools = [
            PoolDescriptor::new(8, 4, true, 0),
            PoolDescriptor::new(16, 4, false, 1),
            PoolDescriptor::new(32, 2, false, 1),
        ];
        let table = PoolTable::new(&pools);
        assert_eq!(table.heap_count(), 2);
        assert!(table.validate(2).is_ok());
        assert_eq!(table.heap_required(0), 32 + 16);
        assert_eq!(table.heap_required(1), 64 + 64 + 32);
        assert_eq!(table.pools_in_heap(1).map(|(i, _)| i).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        assert_eq!(PoolTable::new(&[]).validate(1), Err(Error::EmptyPoolTable));
    }

    #[test]
    fn test_validate_rejects_zero_heaps() {
        let pools = [PoolDescriptor::new(8, 1, false, 0)];
        assert_eq!(PoolTable::new(&pools).validate(0), Err(Error::InvalidHeapCount));
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let cases = [
            PoolDescriptor::new(2, 1, false, 0),
            PoolDescriptor::new(10, 1, false, 0),
            PoolDescriptor::new(8, 0, false, 0),
            PoolDescriptor::new(8, 1, false, 3),
        ];
        for pool in cases {
            let pools = [pool];
            let err = PoolTable::new(&pools).validate(1).unwrap_err();
            assert!(matches!(err, Error::InvalidPoolEntry { index: 0, .. }), "{pool:?}");
        }
    }

    #[test]
    fn test_validate_rejects_heap_without_pools() {
        let pools = [PoolDescriptor::new(8, 1, false, 1)];
        assert_eq!(
            PoolTable::new(&pools).validate(2),
            Err(Error::EmptyHeap { heap: 0 })
        );
    }

    #[test]
    fn test_summary_format() {
        let pools = [
            PoolDescriptor::new(16, 200, true, 0),
            PoolDescriptor::new(1024, 6, false, 0),
        ];
        assert_eq!(
            PoolTable::new(&pools).to_string(),
            "(sz:16,num:200,brw:1,idx:0) (sz:1024,num:6,brw:0,idx:0)"
        );
    }
}
