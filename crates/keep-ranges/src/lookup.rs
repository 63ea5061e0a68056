use crate::range::{LocatorAndRange, Range};

/// Find the index of the entry containing `range_start`.
///
/// Binary search over a sorted, contiguous index. `lo`/`hi` always bracket
/// the candidate; the search gives up when the bracket collapses without a
/// match, which happens exactly when `range_start` lies outside the covered
/// address space. Zero-length entries never match.
pub fn first_block<L>(ranges: &[Range<L>], range_start: u64) -> Option<usize> {
    if ranges.is_empty() {
        return None;
    }

    let mut lo = 0;
    let mut hi = ranges.len();
    let mut i = (lo + hi) / 2;

    while !ranges[i].contains(range_start) {
        if lo == i {
            return None;
        }
        if range_start >= ranges[i].range_end() {
            lo = i;
        } else {
            hi = i;
        }
        i = (lo + hi) / 2;
    }

    Some(i)
}

/// Resolve `[range_start, range_start + range_size)` into the entries that
/// cover it, each clipped to the queried range.
///
/// Returns an empty list when `range_size == 0` or when `range_start` lies
/// outside the index. A query running past the end of the index is clipped
/// to the covered space.
pub fn locators_and_ranges<L: Clone>(
    ranges: &[Range<L>],
    range_start: u64,
    range_size: u64,
) -> Vec<LocatorAndRange<L>> {
    if range_size == 0 {
        return Vec::new();
    }

    let Some(mut i) = first_block(ranges, range_start) else {
        return Vec::new();
    };

    let range_end = range_start + range_size;
    let mut resp = Vec::new();

    while i < ranges.len() {
        let entry = &ranges[i];
        let block_start = entry.range_start;
        let block_end = entry.range_end();
        i += 1;

        if range_end <= block_start {
            // query ends before this entry starts
            break;
        }

        let (offset, size) = if range_start >= block_start && range_end <= block_end {
            // query starts and ends in this entry
            (range_start - block_start, range_size)
        } else if range_start >= block_start {
            // query starts in this entry and runs past it
            (range_start - block_start, block_end - range_start)
        } else if range_end > block_end {
            // query started earlier and covers this entry entirely
            (0, entry.range_size)
        } else {
            // query started earlier and ends in this entry
            (0, range_end - block_start)
        };

        if size == 0 {
            continue;
        }

        resp.push(LocatorAndRange::new(
            entry.locator.clone(),
            entry.range_size,
            entry.segment_offset + offset,
            size,
        ));
    }

    tracing::trace!(
        range_start,
        range_size,
        pieces = resp.len(),
        "resolved range"
    );
    resp
}
