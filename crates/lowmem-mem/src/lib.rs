//! Low-memory heap infrastructure for embedded interpreters.
//!
//! This crate provides the memory layer an interpreter runs on when RAM is
//! counted in kilobytes:
//!
//! - **Pool heap** ([`HeapSet`]): one contiguous buffer per heap, carved into
//!   fixed-size pools described by a [`PoolTable`], with optional borrowing
//!   from the next larger pool
//! - **Pointer compression** ([`PointerCompressor`]): heap pointers encoded as
//!   16-bit values, 0 meaning null
//! - **External strings** ([`extstr`]): string payloads kept outside the heap,
//!   in a deduplicated flash buffer, a constant table or individual system
//!   allocations
//!
//! [`LowMemContext`] bundles all of it behind one value, configured by
//! [`Config`].
//!
//! # Examples
//!
//! ```
//! use lowmem_mem::{Config, LowMemContext, PoolTable};
//!
//! let mut ctx = LowMemContext::new(PoolTable::default_table(), &Config::default()).unwrap();
//!
//! let obj = ctx.alloc(24).unwrap();
//! let code = ctx.compress(obj.as_ptr());
//! assert_eq!(ctx.decompress(code), obj.as_ptr());
//! ctx.free(obj.as_ptr()).unwrap();
//!
//! let name = ctx.extstr_check(b"toString").unwrap();
//! assert_eq!(ctx.extstr_check(b"toString"), Some(name));
//! ```

pub mod compress;
pub mod config;
pub mod context;
pub mod error;
pub mod extstr;
pub mod heap;
pub mod pool;

pub use compress::PointerCompressor;
pub use config::{Config, StoreConfig};
pub use context::{LowMemContext, SharedContext};
pub use error::{Error, Result};
pub use extstr::{ExternalStringStore, StoreKind};
pub use heap::{HeapReport, HeapSet, PoolStats};
pub use pool::{DEFAULT_POOL_TABLE, PoolDescriptor, PoolTable};
