use serde::{Deserialize, Serialize};

/// One entry of a range index.
///
/// Covers `[range_start, range_start + range_size)` of the indexed address
/// space. The bytes come from `locator`, starting `segment_offset` bytes into
/// the locator's own address space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range<L> {
    pub locator: L,
    pub range_start: u64,
    pub range_size: u64,
    pub segment_offset: u64,
}

impl<L> Range<L> {
    /// Create a new entry.
    pub fn new(locator: L, range_start: u64, range_size: u64, segment_offset: u64) -> Self {
        Self {
            locator,
            range_start,
            range_size,
            segment_offset,
        }
    }

    /// Exclusive end offset of this entry.
    pub fn range_end(&self) -> u64 {
        self.range_start + self.range_size
    }

    /// Returns `true` if `offset` falls inside this entry.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.range_start && offset < self.range_end()
    }
}

/// A resolved piece of a lookup: the part of one entry that overlaps the
/// queried byte range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorAndRange<L> {
    /// Locator of the entry.
    pub locator: L,
    /// Length of the whole entry.
    pub block_size: u64,
    /// Offset of the overlap within the locator's address space.
    pub segment_offset: u64,
    /// Length of the overlap.
    pub segment_size: u64,
}

impl<L> LocatorAndRange<L> {
    pub fn new(locator: L, block_size: u64, segment_offset: u64, segment_size: u64) -> Self {
        Self {
            locator,
            block_size,
            segment_offset,
            segment_size,
        }
    }
}

/// Total addressable size of an index: the end of its last entry.
pub fn total_size<L>(ranges: &[Range<L>]) -> u64 {
    ranges.last().map(Range::range_end).unwrap_or(0)
}
