//! Lookup of strings baked into the binary.
//!
//! A [`ConstantTable`] concatenates any number of static string lists (the
//! interpreter's own names first, then application names) into one ordered,
//! read-only table. [`ConstantStore`] answers `check` with the address of the
//! matching table entry itself: no copy, no allocation, nothing to free.
//!
//! Matching is exact: same length, same bytes. When a string occurs twice
//! the first entry wins.

use std::ffi::CStr;
use std::ptr::NonNull;

use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use lowmem_log::{escape_bytes, trace};

use super::strings::{APP_STRINGS, BUILTIN_STRINGS};
use super::{ExternalStringStore, StoreKind};
use crate::error::{Error, Result};

/// Read-only table of NUL-terminated strings with a content index.
pub struct ConstantTable {
    entries: Vec<&'static CStr>,
    /// Content (without NUL) to position of its first occurrence.
    index: HashMap<&'static [u8], usize, FxBuildHasher>,
}

impl ConstantTable {
    /// Concatenates `sources` in order.
    #[must_use]
    pub fn new(sources: &[&'static [&'static CStr]]) -> Self {
        Self::from_entries(sources.iter().flat_map(|s| s.iter().copied()).collect())
    }

    /// Builds a table from raw byte strings, each carrying its own trailing
    /// NUL and no other. Entries borrow `entries` directly.
    pub fn from_bytes(entries: &[&'static [u8]]) -> Result<Self> {
        let strings = entries
            .iter()
            .enumerate()
            .map(|(index, &bytes)| {
                CStr::from_bytes_with_nul(bytes)
                    .map_err(|_| Error::ConstantTableEntry { index })
            })
            .collect::<Result<Vec<&'static CStr>>>()?;
        Ok(Self::from_entries(strings))
    }

    fn from_entries(entries: Vec<&'static CStr>) -> Self {
        let mut index =
            HashMap::with_capacity_and_hasher(entries.len(), FxBuildHasher::default());
        for (i, entry) in entries.iter().enumerate() {
            index.entry(entry.to_bytes()).or_insert(i);
        }

        Self { entries, index }
    }

    /// Interpreter built-ins followed by application strings.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(&[BUILTIN_STRINGS, APP_STRINGS])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&'static CStr> {
        self.entries.get(index).copied()
    }

    /// Position of the first entry equal to `bytes`.
    #[must_use]
    pub fn position(&self, bytes: &[u8]) -> Option<usize> {
        self.index.get(bytes).copied()
    }
}

impl Default for ConstantTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// External string store backed by a [`ConstantTable`].
pub struct ConstantStore {
    table: ConstantTable,
}

impl ConstantStore {
    #[must_use]
    pub const fn new(table: ConstantTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self::new(ConstantTable::builtin())
    }

    #[must_use]
    pub const fn table(&self) -> &ConstantTable {
        &self.table
    }
}

impl ExternalStringStore for ConstantStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Constant
    }

    fn check(&mut self, bytes: &[u8]) -> Option<NonNull<u8>> {
        let Some(i) = self.table.position(bytes) else {
            trace!("constant check {} -> not found", escape_bytes(bytes, false));
            return None;
        };
        trace!("constant check {} -> index {i}", escape_bytes(bytes, false));
        let entry = self.table.get(i)?;
        Some(NonNull::from(entry.to_bytes_with_nul()).cast::<u8>())
    }

    unsafe fn free(&mut self, ptr: NonNull<u8>) {
        trace!("constant free {:p} (static)", ptr.as_ptr());
    }
}
