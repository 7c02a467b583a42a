//! Free address space and segment placement.
//!
//! The virtual address space is modelled as the loadable sections of the image plus
//! the free ranges between them: the gap between each pair of consecutive sections and
//! the range from the last section up to the address limit. A growing segment either
//! keeps its base (its trailing free range absorbs the growth) or moves to the first
//! free range that holds the whole grown segment at the segment's alignment.

use crate::program::BinaryImage;

/// A range of unoccupied virtual addresses, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRange {
    /// First free address
    pub start: u64,
    /// First address past the range
    pub end: u64,
}

impl FreeRange {
    /// Creates a range covering `[start, end)`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        FreeRange { start, end }
    }

    /// Size of the range in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns the aligned base at which `size` bytes fit into the range.
    #[must_use]
    pub fn fit(&self, size: u64, alignment: u64) -> Option<u64> {
        let base = align_up(self.start, alignment)?;
        let end = base.checked_add(size)?;
        (end <= self.end).then_some(base)
    }
}

/// Where a modified segment ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The segment keeps its base address
    InPlace,
    /// The segment moves to a new base address
    Relocate(u64),
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// Alignments of 0 and 1 leave the value unchanged. Returns `None` on overflow.
#[must_use]
pub fn align_up(value: u64, alignment: u64) -> Option<u64> {
    if alignment <= 1 {
        return Some(value);
    }
    let remainder = value % alignment;
    if remainder == 0 {
        Some(value)
    } else {
        value.checked_add(alignment - remainder)
    }
}

/// Computes the free ranges of `image` below `limit`.
///
/// Ranges are the gaps between consecutive loadable sections (ordered by address) and
/// the range from the end of the last section to `limit`. Address space below the
/// first section is never handed out.
#[must_use]
pub fn free_ranges(image: &BinaryImage, limit: u64) -> Vec<FreeRange> {
    let mut ranges = Vec::new();
    let mut occupied_end: Option<u64> = None;

    for index in image.loadable_by_address() {
        let section = &image.sections[index];
        if let Some(end) = occupied_end {
            if section.address > end {
                ranges.push(FreeRange::new(end, section.address.min(limit)));
            }
        }
        occupied_end = Some(occupied_end.map_or(section.end(), |end| end.max(section.end())));
    }

    if let Some(end) = occupied_end {
        if end < limit {
            ranges.push(FreeRange::new(end, limit));
        }
    }
    ranges.retain(|range| range.size() > 0);
    ranges
}

/// Decides where a segment of `size` bytes at `address` goes once it needs `required`
/// bytes.
///
/// # Arguments
///
/// * `address` - Current base of the segment
/// * `size` - Current size of the segment
/// * `required` - Size after the transformation
/// * `alignment` - Required alignment of a new base
/// * `ranges` - Free ranges from [`free_ranges`]
///
/// # Returns
///
/// `None` if the segment neither grows in place nor fits any free range.
#[must_use]
pub fn place(
    address: u64,
    size: u64,
    required: u64,
    alignment: u64,
    ranges: &[FreeRange],
) -> Option<Placement> {
    let end = address.saturating_add(size);
    let trailing = ranges
        .iter()
        .find(|range| range.start == end)
        .map_or(0, FreeRange::size);
    if required <= size.saturating_add(trailing) {
        return Some(Placement::InPlace);
    }

    ranges
        .iter()
        .find_map(|range| range.fit(required, alignment))
        .map(Placement::Relocate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::create_image;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0x400080, 16), Some(0x400080));
        assert_eq!(align_up(0x400081, 16), Some(0x400090));
        assert_eq!(align_up(7, 0), Some(7));
        assert_eq!(align_up(u64::MAX, 16), None);
    }

    #[test]
    fn test_free_ranges() {
        let image = create_image();
        let ranges = free_ranges(&image, image.address_limit);
        assert_eq!(
            ranges,
            vec![
                FreeRange::new(0x400080, 0x4000c0),
                FreeRange::new(0x400100, 0x8000_0000)
            ]
        );
    }

    #[test]
    fn test_grow_in_place_into_trailing_gap() {
        let ranges = [FreeRange::new(0x400080, 0x4000c0)];
        // .data ends where the gap begins.
        assert_eq!(
            place(0x400040, 0x40, 0x60, 16, &ranges),
            Some(Placement::InPlace)
        );
        // Shrinking always stays.
        assert_eq!(place(0x400000, 0x40, 0x20, 16, &[]), Some(Placement::InPlace));
    }

    #[test]
    fn test_first_fit_skips_small_ranges() {
        let image = create_image();
        let ranges = free_ranges(&image, image.address_limit);
        // 76 bytes do not fit the 64-byte gap after .data.
        assert_eq!(
            place(0x400000, 0x40, 76, 16, &ranges),
            Some(Placement::Relocate(0x400100))
        );
        // Without the open range above .rodata nothing fits.
        assert_eq!(place(0x400000, 0x40, 76, 16, &ranges[..1]), None);
        assert_eq!(
            place(0x4000c0, 0x40, 0x40, 16, &ranges),
            Some(Placement::InPlace)
        );
    }

    #[test]
    fn test_alignment_padding_counts() {
        let ranges = [FreeRange::new(0x1004, 0x1050)];
        assert_eq!(ranges[0].fit(0x40, 16), Some(0x1010));
        assert_eq!(ranges[0].fit(0x48, 16), None);
        assert_eq!(ranges[0].fit(0x48, 4), Some(0x1004));
    }

    #[test]
    fn test_no_placement() {
        let ranges = [FreeRange::new(0x2000, 0x2010)];
        assert_eq!(place(0x1000, 0x10, 0x20, 4, &ranges), None);
    }
}
