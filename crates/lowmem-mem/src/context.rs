//! The explicit owner of all allocator state.
//!
//! The embedding interpreter holds one [`LowMemContext`] (or a
//! [`SharedContext`] when several threads drive it) instead of reaching for
//! globals. It bundles the heaps, the compressor for heap 0 and the external
//! string store, which is chosen once when the context is built.

use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lowmem_log::{error, info};

use crate::compress::PointerCompressor;
use crate::config::Config;
use crate::error::Result;
use crate::extstr::{ExternalStringStore, StoreKind, build_store};
use crate::heap::{HeapReport, HeapSet};
use crate::pool::PoolTable;

/// Heaps, pointer compression and external strings behind one value.
pub struct LowMemContext {
    heaps: HeapSet,
    compressor: PointerCompressor,
    store: Option<Box<dyn ExternalStringStore>>,
}

impl LowMemContext {
    pub fn new(table: PoolTable<'_>, config: &Config) -> Result<Self> {
        let heaps = HeapSet::new(table, config.heap_count)?;
        let compressor = heaps.compressor(0)?;
        let store = build_store(&config.store);
        if store.is_none() {
            info!("External strings disabled");
        }
        Ok(Self {
            heaps,
            compressor,
            store,
        })
    }

    /// Process-start entry point: applies the log level, then builds the
    /// context or exits with a diagnostic.
    #[must_use]
    pub fn init_or_exit(table: PoolTable<'_>, config: &Config) -> Self {
        config.apply_logging();
        match Self::new(table, config) {
            Ok(ctx) => ctx,
            Err(err) => {
                error!("Failed to allocate heap: {err}");
                std::process::exit(1)
            }
        }
    }

    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.heaps.alloc(size)
    }

    pub fn realloc(&mut self, ptr: *mut u8, size: usize) -> Result<Option<NonNull<u8>>> {
        self.heaps.realloc(ptr, size)
    }

    pub fn free(&mut self, ptr: *mut u8) -> Result<()> {
        self.heaps.free(ptr)
    }

    /// Encodes a heap-0 pointer; aborts if it cannot be represented.
    #[must_use]
    pub fn compress(&self, ptr: *const u8) -> u16 {
        self.compressor.compress(ptr)
    }

    pub fn try_compress(&self, ptr: *const u8) -> Result<u16> {
        self.compressor.try_compress(ptr)
    }

    #[must_use]
    pub fn decompress(&self, code: u16) -> *mut u8 {
        self.compressor.decompress(code)
    }

    /// Offers a string to the external store. `None` when the store declines
    /// or external strings are disabled.
    pub fn extstr_check(&mut self, bytes: &[u8]) -> Option<NonNull<u8>> {
        self.store.as_mut()?.check(bytes)
    }

    /// Hands an external string back to the store.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`extstr_check`](Self::extstr_check)
    /// on this context and not been freed since.
    pub unsafe fn extstr_free(&mut self, ptr: NonNull<u8>) {
        if let Some(store) = self.store.as_mut() {
            // SAFETY: forwarded contract.
            unsafe { store.free(ptr) };
        }
    }

    #[must_use]
    pub fn store_kind(&self) -> Option<StoreKind> {
        self.store.as_ref().map(|s| s.kind())
    }

    #[must_use]
    pub const fn heaps(&self) -> &HeapSet {
        &self.heaps
    }

    #[must_use]
    pub const fn compressor(&self) -> &PointerCompressor {
        &self.compressor
    }

    #[must_use]
    pub fn report(&self) -> HeapReport {
        self.heaps.report()
    }

    /// Logs pool usage and the active string strategy.
    pub fn dump(&self) {
        self.heaps.dump();
        match self.store_kind() {
            Some(kind) => info!("External strings: {kind}"),
            None => info!("External strings: disabled"),
        }
    }
}

/// A [`LowMemContext`] behind a mutex, for hosts that call in from more than
/// one thread.
pub struct SharedContext {
    inner: Mutex<LowMemContext>,
}

impl SharedContext {
    #[must_use]
    pub const fn new(ctx: LowMemContext) -> Self {
        Self {
            inner: Mutex::new(ctx),
        }
    }

    /// Locks the context. A panic on another thread does not make the heap
    /// unusable, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, LowMemContext> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the context.
    pub fn with<R>(&self, f: impl FnOnce(&mut LowMemContext) -> R) -> R {
        f(&mut self.lock())
    }

    #[must_use]
    pub fn into_inner(self) -> LowMemContext {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<LowMemContext> for SharedContext {
    fn from(ctx: LowMemContext) -> Self {
        Self::new(ctx)
    }
}
