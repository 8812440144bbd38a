//! External strings: immutable string payloads kept outside the interpreter
//! heap.
//!
//! Whenever the interpreter is about to intern a string it asks the active
//! [`ExternalStringStore`] whether the bytes can live elsewhere. A `Some`
//! pointer is kept by the interpreter instead of a copy in its own arena; it
//! is handed back through [`ExternalStringStore::free`] when the interned
//! string is collected. `None` is the complete error channel: the caller
//! falls back to normal interning.
//!
//! Every pointer a store returns addresses exactly the input bytes followed by
//! one NUL byte, and stays valid at least until it is freed or the store is
//! dropped.
//!
//! Three strategies exist:
//!
//! - [`FlashStore`]: deduplicated, append-only buffer (a stand-in for a
//!   memory-mapped flash area).
//! - [`ConstantStore`]: lookup in a read-only table of strings known at build
//!   time.
//! - [`LeakTrackingStore`]: one system allocation per string, so external
//!   memory checkers can pair every `check` with its `free`.
//!
//! # Examples
//!
//! ```
//! use lowmem_mem::extstr::{ExternalStringStore, FlashStore, extstr_bytes};
//!
//! let mut store = FlashStore::new(1024);
//! let ptr = store.check(b"prototype").unwrap();
//! assert_eq!(unsafe { extstr_bytes(ptr, 9) }, b"prototype");
//! assert_eq!(store.check(b"prototype"), Some(ptr));
//! ```

pub mod constant;
pub mod flash;
pub mod strings;
pub mod tracking;

use std::ffi::CStr;
use std::fmt;
use std::ptr::NonNull;
use std::str::FromStr;

use crate::config::StoreConfig;
use crate::error::Error;

pub use constant::{ConstantStore, ConstantTable};
pub use flash::{DEFAULT_FLASH_CAPACITY, FlashStore};
pub use tracking::LeakTrackingStore;

/// The strategy a store implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Append-only deduplicated buffer.
    Flash,
    /// Read-only table of known strings.
    Constant,
    /// One system allocation per string.
    LeakTracking,
}

impl StoreKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreKind::Flash => "flash",
            StoreKind::Constant => "constant",
            StoreKind::LeakTracking => "tracking",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flash" | "dedup" => Ok(StoreKind::Flash),
            "constant" | "const" => Ok(StoreKind::Constant),
            "tracking" | "leak-tracking" | "malloc" => Ok(StoreKind::LeakTracking),
            _ => Err(Error::InvalidStrategy { name: s.to_string() }),
        }
    }
}

/// The boundary between the interpreter's interning path and a storage
/// strategy.
pub trait ExternalStringStore: Send {
    /// Which strategy this store implements.
    fn kind(&self) -> StoreKind;

    /// Offers `bytes` for external storage.
    ///
    /// Returns a pointer to a NUL-terminated copy (or an existing identical
    /// payload), or `None` when the caller should intern the string itself.
    fn check(&mut self, bytes: &[u8]) -> Option<NonNull<u8>>;

    /// Releases a pointer returned by [`check`](Self::check).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `check` on this same store, and must
    /// not have been freed since.
    unsafe fn free(&mut self, ptr: NonNull<u8>);
}

impl<S: ExternalStringStore + ?Sized> ExternalStringStore for Box<S> {
    fn kind(&self) -> StoreKind {
        (**self).kind()
    }

    fn check(&mut self, bytes: &[u8]) -> Option<NonNull<u8>> {
        (**self).check(bytes)
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>) {
        // SAFETY: forwarded contract.
        unsafe { (**self).free(ptr) }
    }
}

/// Views the payload of an external string.
///
/// # Safety
///
/// `ptr` must come from a store's `check` for a string of `len` bytes and
/// must still be live for `'a`.
#[must_use]
pub unsafe fn extstr_bytes<'a>(ptr: NonNull<u8>, len: usize) -> &'a [u8] {
    // SAFETY: guaranteed by the caller.
    unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) }
}

/// Views an external string up to its terminating NUL.
///
/// Strings with interior NUL bytes are cut short; use [`extstr_bytes`] when
/// the length is known.
///
/// # Safety
///
/// `ptr` must come from a store's `check` and must still be live for `'a`.
#[must_use]
pub unsafe fn extstr_cstr<'a>(ptr: NonNull<u8>) -> &'a CStr {
    // SAFETY: every store NUL-terminates its payloads.
    unsafe { CStr::from_ptr(ptr.as_ptr().cast()) }
}

/// Builds the store selected by `config`, or `None` when external strings
/// are disabled.
#[must_use]
pub fn build_store(config: &StoreConfig) -> Option<Box<dyn ExternalStringStore>> {
    let store: Box<dyn ExternalStringStore> = match config.kind? {
        StoreKind::Flash => Box::new(FlashStore::new(config.flash_capacity)),
        StoreKind::Constant => Box::new(ConstantStore::builtin()),
        StoreKind::LeakTracking => Box::new(LeakTrackingStore::new()),
    };
    lowmem_log::info!("External string strategy: {}", store.kind());
    Some(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_parsing() {
        assert_eq!("flash".parse(), Ok(StoreKind::Flash));
        assert_eq!("CONSTANT".parse(), Ok(StoreKind::Constant));
        assert_eq!("tracking".parse(), Ok(StoreKind::LeakTracking));
        assert_eq!(
            "rope".parse::<StoreKind>(),
            Err(Error::InvalidStrategy { name: "rope".to_string() })
        );
    }

    #[test]
    fn test_store_kind_display_round_trips() {
        for kind in [StoreKind::Flash, StoreKind::Constant, StoreKind::LeakTracking] {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
    }

    #[test]
    fn test_build_store_selects_kind() {
        for kind in [StoreKind::Flash, StoreKind::Constant, StoreKind::LeakTracking] {
            let config = StoreConfig::new(Some(kind));
            assert_eq!(build_store(&config).map(|s| s.kind()), Some(kind));
        }
        assert!(build_store(&StoreConfig::disabled()).is_none());
    }

    #[test]
    fn test_every_store_nul_terminates() {
        let config = StoreConfig::new(Some(StoreKind::Flash));
        let mut stores: Vec<Box<dyn ExternalStringStore>> = vec![
            build_store(&config).unwrap(),
            Box::new(ConstantStore::builtin()),
            Box::new(LeakTrackingStore::new()),
        ];
        for store in &mut stores {
            let ptr = store.check(b"prototype").unwrap();
            let cstr = unsafe { extstr_cstr(ptr) };
            assert_eq!(cstr.to_bytes(), b"prototype");
            unsafe { store.free(ptr) };
        }
    }
}
