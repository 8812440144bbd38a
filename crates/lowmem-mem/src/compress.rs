//! 16-bit pointer compression.
//!
//! A compressed pointer is the word offset of an address from a virtual base
//! placed one alignment unit *below* the heap start, so the first valid
//! address encodes to 1 and 0 stays free for null:
//!
//! ```text
//! code = (addr - (base - align)) >> log2(align)
//! addr = (base - align) + (code << log2(align))
//! ```
//!
//! With 4-byte alignment this addresses `0xFFFF << 2` bytes, just under
//! 256 KiB. Heaps larger than that are a sizing error, and compressing a
//! pointer that does not fit aborts the process instead of truncating.
//!
//! # Examples
//!
//! ```
//! use lowmem_mem::{HeapSet, PoolDescriptor, PoolTable};
//!
//! const POOLS: &[PoolDescriptor] = &[PoolDescriptor::new(16, 8, false, 0)];
//!
//! let mut heaps = HeapSet::new(PoolTable::new(POOLS), 1).unwrap();
//! let compressor = heaps.compressor(0).unwrap();
//!
//! let ptr = heaps.alloc(12).unwrap();
//! let code = compressor.compress(ptr.as_ptr());
//! assert_ne!(code, 0);
//! assert_eq!(compressor.decompress(code), ptr.as_ptr());
//! assert_eq!(compressor.compress(std::ptr::null()), 0);
//! ```

use std::ptr::{self, NonNull};

use lowmem_log::fatal;

use crate::error::{Error, Result};

/// Largest representable code.
pub const MAX_CODE: usize = 0xFFFF;

/// Converts between heap addresses and 16-bit codes for one heap.
///
/// The compressor only borrows the heap's address; it must not outlive the
/// [`HeapSet`](crate::HeapSet) it was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerCompressor {
    base: NonNull<u8>,
    len: usize,
    alignment: usize,
    shift: u32,
}

// SAFETY: the compressor never dereferences `base`; it only does address
// arithmetic on it.
unsafe impl Send for PointerCompressor {}
unsafe impl Sync for PointerCompressor {}

impl PointerCompressor {
    /// Creates a compressor for the `len`-byte region starting at `base`.
    ///
    /// `base` must itself be `alignment`-aligned.
    pub fn new(base: NonNull<u8>, len: usize, alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(Error::InvalidAlignment { alignment });
        }
        if base.as_ptr().addr() % alignment != 0 {
            return Err(Error::MisalignedPointer {
                ptr: base.as_ptr().addr(),
                alignment,
            });
        }
        Ok(Self {
            base,
            len,
            alignment,
            shift: alignment.trailing_zeros(),
        })
    }

    #[must_use]
    pub const fn base(&self) -> NonNull<u8> {
        self.base
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// Largest heap offset that can be encoded.
    #[must_use]
    pub const fn max_addressable(&self) -> usize {
        (MAX_CODE << self.shift) - self.alignment
    }

    /// Returns true if every address of the governed region is encodable.
    #[must_use]
    pub const fn covers_heap(&self) -> bool {
        self.len <= self.max_addressable() + self.alignment
    }

    /// Encodes `ptr`, reporting out-of-range or misaligned input.
    pub fn try_compress(&self, ptr: *const u8) -> Result<u16> {
        if ptr.is_null() {
            return Ok(0);
        }

        let addr = ptr.addr();
        let offset = addr
            .checked_sub(self.base.as_ptr().addr())
            .filter(|&off| off < self.len)
            .ok_or(Error::PointerOutOfHeap { ptr: addr })?;

        if offset % self.alignment != 0 {
            return Err(Error::MisalignedPointer {
                ptr: addr,
                alignment: self.alignment,
            });
        }

        let code = (offset >> self.shift) + 1;
        u16::try_from(code).map_err(|_| Error::CompressionOverflow { ptr: addr, code })
    }

    /// Encodes `ptr`, aborting the process if it cannot be represented.
    #[must_use]
    pub fn compress(&self, ptr: *const u8) -> u16 {
        match self.try_compress(ptr) {
            Ok(code) => code,
            Err(err) => fatal!("Failed to compress pointer: {err}"),
        }
    }

    /// Decodes a code produced by [`compress`](Self::compress).
    ///
    /// 0 yields null. Codes that were never produced by this compressor decode
    /// to addresses that may lie outside the heap; the result is only a
    /// pointer value and dereferencing it is the caller's responsibility.
    #[must_use]
    pub fn decompress(&self, code: u16) -> *mut u8 {
        if code == 0 {
            return ptr::null_mut();
        }
        let offset = (usize::from(code) - 1) << self.shift;
        self.base.as_ptr().wrapping_add(offset)
    }
}
