//! Old-to-new block address mapping.
//!
//! The [`AddressMap`] is produced by block re-addressing and consumed by branch
//! retargeting and symbol fixup. It only holds blocks whose start address actually
//! changed, so a run over an unmodified program yields an empty map.

use std::collections::BTreeMap;

/// Maps the original start address of every moved block to its new start address.
///
/// # Examples
///
/// ```rust,ignore
/// let map = report.address_map;
/// for (old, new) in map.iter() {
///     println!("0x{old:08x} -> 0x{new:08x}");
/// }
/// assert_eq!(map.translate(0x400008), 0x400108);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressMap {
    entries: BTreeMap<u64, u64>,
}

impl AddressMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the block at `old` now starts at `new`.
    ///
    /// Identity pairs are ignored, keeping the map limited to moved blocks.
    pub fn insert(&mut self, old: u64, new: u64) {
        if old != new {
            self.entries.insert(old, new);
        }
    }

    /// Returns the new address of the block originally at `old`.
    #[must_use]
    pub fn get(&self, old: u64) -> Option<u64> {
        self.entries.get(&old).copied()
    }

    /// Returns the new address for `old`, or `old` itself if the block did not move.
    #[must_use]
    pub fn translate(&self, old: u64) -> u64 {
        self.get(old).unwrap_or(old)
    }

    /// Returns `true` if a block originally started at `old` and moved.
    #[must_use]
    pub fn contains(&self, old: u64) -> bool {
        self.entries.contains_key(&old)
    }

    /// Number of moved blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no block moved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(old, new)` pairs in ascending old-address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries.iter().map(|(old, new)| (*old, *new))
    }
}
