//! Deduplicating append-only string buffer.
//!
//! Models a fixed, memory-mapped flash area that strings are written into
//! sequentially. Before writing, the used part of the buffer is searched for
//! an identical NUL-terminated payload; the search considers every offset, so
//! a string that is the tail of an earlier entry reuses that tail.
//!
//! Entries are never reclaimed: `free` is a no-op and `used` only grows.
//!
//! The search is a first-byte filtered linear scan. Results are cached in a
//! table keyed by content hash that stores only offsets and lengths; equality
//! is checked against the buffer itself. The cache is exact: the first match
//! in buffer order can never change once found, because the buffer only grows
//! at its end.

use std::hash::BuildHasher;
use std::ptr::{self, NonNull};

use fxhash::FxBuildHasher;
use hashbrown::HashTable;
use lowmem_log::{escape_bytes, trace};

use super::{ExternalStringStore, StoreKind};

/// Size of the flash area when none is configured.
pub const DEFAULT_FLASH_CAPACITY: usize = 65536;

/// Strings of this length or shorter are never externalized; they would
/// take the same space in the interpreter heap anyway.
pub const MIN_EXTERNAL_LEN: usize = 3;

/// A previously returned payload.
#[derive(Debug, Clone, Copy)]
struct Hit {
    hash: u64,
    offset: usize,
    len: usize,
}

/// Append-only deduplicated string buffer.
pub struct FlashStore {
    /// Leaked boxed slice of `capacity` bytes. Kept as a raw pointer so that
    /// appends never retag the whole buffer and invalidate payload pointers
    /// already handed out.
    data: NonNull<u8>,
    capacity: usize,
    used: usize,
    /// Payloads previously returned, by content hash.
    hits: HashTable<Hit>,
    hasher: FxBuildHasher,
}

// SAFETY: the buffer is owned exclusively by the store; payload pointers
// handed out are only read.
unsafe impl Send for FlashStore {}

impl FlashStore {
    /// Creates a store with a zeroed buffer of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let data: &'static mut [u8] = Box::leak(vec![0u8; capacity].into_boxed_slice());
        Self {
            data: NonNull::from(data).cast::<u8>(),
            capacity,
            used: 0,
            hits: HashTable::new(),
            hasher: FxBuildHasher::default(),
        }
    }

    /// Bytes written so far, terminators included.
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// The used part of the buffer.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        // SAFETY: the first `used` bytes are initialized and never rewritten.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.used) }
    }

    /// Offset of the first NUL-terminated copy of `bytes` in the used area.
    fn scan(&self, bytes: &[u8]) -> Option<usize> {
        let initial = *bytes.first()?;
        let used = self.contents();
        let len = bytes.len();

        used.iter().enumerate().find_map(|(i, &b)| {
            if b != initial || used.len() - i < len + 1 {
                return None;
            }
            (used[i..i + len] == *bytes && used[i + len] == 0).then_some(i)
        })
    }

    /// True if a NUL-terminated copy of `bytes` starts at `offset`.
    fn matches_at(&self, offset: usize, bytes: &[u8]) -> bool {
        let used = self.contents();
        let end = offset + bytes.len();
        end < used.len() && used[offset..end] == *bytes && used[end] == 0
    }

    fn cached(&self, hash: u64, bytes: &[u8]) -> Option<usize> {
        self.hits
            .find(hash, |h| {
                h.hash == hash && h.len == bytes.len() && self.matches_at(h.offset, bytes)
            })
            .map(|h| h.offset)
    }

    fn remember(&mut self, hash: u64, offset: usize, len: usize) {
        self.hits
            .insert_unique(hash, Hit { hash, offset, len }, |h| h.hash);
    }

    /// Heap bytes held by the hit cache.
    #[must_use]
    pub fn cache_bytes(&self) -> usize {
        self.hits.capacity() * std::mem::size_of::<Hit>()
    }

    fn ptr_at(&self, offset: usize) -> Option<NonNull<u8>> {
        NonNull::new(self.data.as_ptr().wrapping_add(offset))
    }
}

impl Drop for FlashStore {
    fn drop(&mut self) {
        let slice = ptr::slice_from_raw_parts_mut(self.data.as_ptr(), self.capacity);
        // SAFETY: `data` came from Box::leak of a boxed slice of `capacity`
        // bytes in `new`.
        drop(unsafe { Box::from_raw(slice) });
    }
}

impl Default for FlashStore {
    fn default() -> Self {
        Self::new(DEFAULT_FLASH_CAPACITY)
    }
}

impl ExternalStringStore for FlashStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Flash
    }

    fn check(&mut self, bytes: &[u8]) -> Option<NonNull<u8>> {
        let len = bytes.len();
        if len <= MIN_EXTERNAL_LEN {
            return None;
        }

        let hash = self.hasher.hash_one(bytes);
        if let Some(offset) = self.cached(hash, bytes) {
            trace!("flash check {} -> cached offset {offset}", escape_bytes(bytes, false));
            return self.ptr_at(offset);
        }

        if let Some(offset) = self.scan(bytes) {
            trace!(
                "flash check {} -> existing offset {offset} (used={})",
                escape_bytes(bytes, false),
                self.used
            );
            self.remember(hash, offset, len);
            return self.ptr_at(offset);
        }

        if len + 1 > self.remaining() {
            trace!(
                "flash check {} -> no space (used={})",
                escape_bytes(bytes, false),
                self.used
            );
            return None;
        }

        let offset = self.used;
        // SAFETY: offset + len + 1 <= capacity was checked above, and the
        // target bytes lie past every payload handed out so far.
        unsafe {
            let dst = self.data.as_ptr().add(offset);
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, len);
            dst.add(len).write(0);
        }
        self.used += len + 1;
        self.remember(hash, offset, len);

        trace!(
            "flash check {} -> new offset {offset} (used={})",
            escape_bytes(bytes, false),
            self.used
        );
        self.ptr_at(offset)
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>) {
        trace!("flash free {:p} (kept)", ptr.as_ptr());
    }
}
