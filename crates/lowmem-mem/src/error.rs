//! Error types for the `lowmem` heap.
//!
//! Two classes of failure exist. Configuration errors (pool tables that
//! cannot be laid out, heaps that do not fit 16-bit compression, pointers
//! outside the compressible range) surface here as [`Error`] values from the
//! fallible constructors; the process-start wrappers turn them into a
//! diagnostic followed by termination. Expected misses on the external string
//! path never become errors at all: `check` just returns `None`.

use std::fmt;

/// Errors reported by the heap, the compressor and the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The pool table has no entries.
    EmptyPoolTable,

    /// Heap count of zero requested.
    InvalidHeapCount,

    /// A pool descriptor cannot be laid out.
    InvalidPoolEntry {
        /// Position of the descriptor in the pool table.
        index: usize,
        /// Which constraint the descriptor violates.
        reason: &'static str,
    },

    /// A heap index has no pools assigned to it.
    EmptyHeap {
        /// The heap without pools.
        heap: usize,
    },

    /// The computed heap size overflows the bookkeeping offsets.
    HeapTooLarge {
        /// The heap being sized.
        heap: usize,
        /// Requested size in bytes (saturated on overflow).
        size: usize,
    },

    /// No heap with this index exists.
    UnknownHeap {
        /// The requested heap index.
        heap: usize,
    },

    /// The system allocator refused the backing buffer.
    OutOfMemory {
        /// The heap being allocated.
        heap: usize,
        /// Requested size in bytes.
        size: usize,
    },

    /// Alignment is not a power of two.
    InvalidAlignment {
        /// The rejected alignment.
        alignment: usize,
    },

    /// Pointer lies outside the heap governed by the compressor.
    PointerOutOfHeap {
        /// Address of the pointer.
        ptr: usize,
    },

    /// Pointer is not a multiple of the compression alignment.
    MisalignedPointer {
        /// Address of the pointer.
        ptr: usize,
        /// Required alignment.
        alignment: usize,
    },

    /// Encoded value does not fit in 16 bits.
    CompressionOverflow {
        /// Address of the pointer.
        ptr: usize,
        /// The code that would have been produced.
        code: usize,
    },

    /// Pointer was not handed out by this heap.
    InvalidPointer {
        /// Address of the pointer.
        ptr: usize,
    },

    /// Unknown external string strategy name.
    InvalidStrategy {
        /// The name that failed to parse.
        name: String,
    },

    /// A configuration value could not be parsed.
    InvalidConfigValue {
        /// Configuration key (usually an environment variable).
        key: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A constant table entry is not NUL-terminated or holds an interior NUL.
    ConstantTableEntry {
        /// Position in the concatenated table.
        index: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyPoolTable => write!(f, "Pool table is empty"),
            Error::InvalidHeapCount => {
                write!(f, "Heap count must be at least 1")
            }
            Error::InvalidPoolEntry { index, reason } => {
                write!(f, "Invalid pool entry {index}: {reason}")
            }
            Error::EmptyHeap { heap } => {
                write!(f, "Heap {heap} has no pools")
            }
            Error::HeapTooLarge { heap, size } => {
                write!(f, "Heap {heap} too large: {size} bytes")
            }
            Error::UnknownHeap { heap } => write!(f, "Unknown heap {heap}"),
            Error::OutOfMemory { heap, size } => {
                write!(f, "Failed to allocate heap {heap} of {size} bytes")
            }
            Error::InvalidAlignment { alignment } => {
                write!(
                    f,
                    "Invalid alignment: {alignment} is not a power of two"
                )
            }
            Error::PointerOutOfHeap { ptr } => {
                write!(f, "Pointer {ptr:#x} is outside the heap")
            }
            Error::MisalignedPointer { ptr, alignment } => {
                write!(f, "Pointer {ptr:#x} is not {alignment}-byte aligned")
            }
            Error::CompressionOverflow { ptr, code } => {
                write!(
                    f,
                    "Failed to compress pointer {ptr:#x}: code {code:#x} exceeds 0xffff"
                )
            }
            Error::InvalidPointer { ptr } => {
                write!(f, "Invalid pointer: {ptr:#x}")
            }
            Error::InvalidStrategy { name } => {
                write!(f, "Unknown external string strategy '{name}'")
            }
            Error::InvalidConfigValue { key, value } => {
                write!(f, "Invalid value for {key}: '{value}'")
            }
            Error::ConstantTableEntry { index } => {
                write!(f, "Constant table entry {index} is not a C string")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type for `lowmem` operations.
pub type Result<T> = std::result::Result<T, Error>;
