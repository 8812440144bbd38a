//! One system allocation per external string.
//!
//! Nothing is shared or deduplicated: every `check` copies the bytes into a
//! fresh allocation and every `free` releases it. This makes each external
//! string visible as an individual block to heap checkers (valgrind, ASan),
//! so a missing `free` shows up as a leak at exit.
//!
//! Each block stores the payload length in a header in front of the payload,
//! which is all `free` needs to rebuild the allocation layout.
//!
//! With the `alloc-backtrace` feature every live string also records where it
//! was allocated; outstanding strings are reported with their backtraces when
//! the store is dropped.

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::{self, NonNull};

#[cfg(feature = "alloc-backtrace")]
use fxhash::FxBuildHasher;
#[cfg(feature = "alloc-backtrace")]
use hashbrown::HashMap;
use lowmem_log::{escape_bytes, trace, warn};

use super::{ExternalStringStore, StoreKind};

const HEADER_SIZE: usize = mem::size_of::<usize>();

/// Layout of a block holding a `len`-byte payload plus NUL, and the payload
/// offset inside it.
fn block_layout(len: usize) -> Option<(Layout, usize)> {
    let payload = Layout::array::<u8>(len.checked_add(1)?).ok()?;
    let (layout, offset) = Layout::new::<usize>().extend(payload).ok()?;
    Some((layout.pad_to_align(), offset))
}

/// External string store that mallocs every string.
#[derive(Default)]
pub struct LeakTrackingStore {
    live: usize,
    allocated: u64,
    freed: u64,
    #[cfg(feature = "alloc-backtrace")]
    origins: HashMap<usize, backtrace::Backtrace, FxBuildHasher>,
}

impl LeakTrackingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strings returned by `check` and not yet freed.
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn allocated(&self) -> u64 {
        self.allocated
    }

    #[must_use]
    pub const fn freed(&self) -> u64 {
        self.freed
    }
}

impl ExternalStringStore for LeakTrackingStore {
    fn kind(&self) -> StoreKind {
        StoreKind::LeakTracking
    }

    fn check(&mut self, bytes: &[u8]) -> Option<NonNull<u8>> {
        let len = bytes.len();
        let (layout, offset) = block_layout(len)?;

        // SAFETY: the layout is never zero-sized, it holds at least the header.
        let block = NonNull::new(unsafe { alloc::alloc(layout) })?;

        // SAFETY: the block is `layout.size()` bytes, which covers the header
        // at offset 0 and `len + 1` payload bytes at `offset`.
        let payload = unsafe {
            block.cast::<usize>().write(len);
            let payload = block.add(offset);
            ptr::copy_nonoverlapping(bytes.as_ptr(), payload.as_ptr(), len);
            payload.add(len).write(0);
            payload
        };

        self.live += 1;
        self.allocated += 1;
        #[cfg(feature = "alloc-backtrace")]
        self.origins
            .insert(payload.as_ptr().addr(), backtrace::Backtrace::new_unresolved());

        trace!(
            "tracking check {} -> {:p} (live={})",
            escape_bytes(bytes, false),
            payload.as_ptr(),
            self.live
        );
        Some(payload)
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>) {
        // SAFETY: `ptr` came from `check`, so a length header precedes it at
        // the offset `block_layout` computes for that length, which is always
        // HEADER_SIZE since the payload is byte aligned.
        unsafe {
            let block = ptr.sub(HEADER_SIZE);
            let len = block.cast::<usize>().read();
            if let Some((layout, _)) = block_layout(len) {
                alloc::dealloc(block.as_ptr(), layout);
            }
        }

        self.live = self.live.saturating_sub(1);
        self.freed += 1;
        #[cfg(feature = "alloc-backtrace")]
        self.origins.remove(&ptr.as_ptr().addr());

        trace!("tracking free {:p} (live={})", ptr.as_ptr(), self.live);
    }
}

impl Drop for LeakTrackingStore {
    fn drop(&mut self) {
        if self.live == 0 {
            return;
        }
        warn!("{} external strings were never freed", self.live);

        #[cfg(feature = "alloc-backtrace")]
        for (addr, origin) in &mut self.origins {
            origin.resolve();
            warn!("leaked external string at {addr:#x} allocated at:\n{origin:?}");
        }
    }
}
