use crate::error::{RangeError, RangeResult};
use crate::lookup::first_block;
use crate::range::{total_size, Range};

/// Rewrite `ranges` in place so that `[range_start, range_start + range_size)`
/// refers to `new_locator`, starting `new_segment_offset` bytes into it.
///
/// Overlapped entries are split, shrunk, or removed so the index stays sorted
/// and contiguous. A splice at the current end of the index appends (or
/// extends the trailing entry when it continues the same locator); a splice
/// that starts inside the index may run past its end, growing the index.
///
/// Returns [`RangeError::OutOfCoverage`] if `range_start` lies beyond the end
/// of the index. A zero-length splice is a no-op.
pub fn replace_range<L: Clone + PartialEq>(
    ranges: &mut Vec<Range<L>>,
    range_start: u64,
    range_size: u64,
    new_locator: L,
    new_segment_offset: u64,
) -> RangeResult<()> {
    if range_size == 0 {
        return Ok(());
    }

    let covered = total_size(ranges);
    if range_start == covered {
        append(ranges, range_start, range_size, new_locator, new_segment_offset);
        return Ok(());
    }

    let Some(mut i) = first_block(ranges, range_start) else {
        return Err(RangeError::OutOfCoverage {
            start: range_start,
            size: range_size,
            covered,
        });
    };

    let range_end = range_start + range_size;
    let new_range = Range::new(new_locator, range_start, range_size, new_segment_offset);

    while i < ranges.len() {
        let segment = ranges[i].clone();
        let segment_start = segment.range_start;
        let segment_end = segment.range_end();

        if range_end <= segment_start {
            // splice ends before this entry starts
            break;
        }

        if range_start >= segment_start && range_end <= segment_end {
            // splice starts and ends in this entry: split it into up to three pieces
            let mut at = i;
            if range_start > segment_start {
                ranges[i] = prefix(&segment, range_start);
                at += 1;
                ranges.insert(at, new_range);
            } else {
                ranges[i] = new_range;
            }
            if segment_end > range_end {
                ranges.insert(at + 1, suffix(&segment, range_end));
            }
            break;
        } else if range_start >= segment_start {
            // splice starts in this entry and runs past it: keep the prefix,
            // insert the new entry, then trim whatever follows
            if range_start > segment_start {
                ranges[i] = prefix(&segment, range_start);
                i += 1;
                ranges.insert(i, new_range.clone());
            } else {
                ranges[i] = new_range.clone();
            }
            i += 1;
        } else if range_end >= segment_end {
            // splice started earlier and covers this entry entirely
            ranges.remove(i);
        } else {
            // splice started earlier and ends in this entry: keep the tail
            ranges[i] = suffix(&segment, range_end);
            break;
        }
    }

    tracing::trace!(range_start, range_size, entries = ranges.len(), "spliced range");
    Ok(())
}

fn append<L: PartialEq>(
    ranges: &mut Vec<Range<L>>,
    range_start: u64,
    range_size: u64,
    new_locator: L,
    new_segment_offset: u64,
) {
    if let Some(last) = ranges.last_mut() {
        if last.locator == new_locator
            && last.segment_offset + last.range_size == new_segment_offset
        {
            last.range_size += range_size;
            return;
        }
        if last.range_size == 0 {
            ranges.pop();
        }
    }
    ranges.push(Range::new(new_locator, range_start, range_size, new_segment_offset));
}

/// The part of `segment` before `at`.
fn prefix<L: Clone>(segment: &Range<L>, at: u64) -> Range<L> {
    Range::new(
        segment.locator.clone(),
        segment.range_start,
        at - segment.range_start,
        segment.segment_offset,
    )
}

/// The part of `segment` from `at` onwards.
fn suffix<L: Clone>(segment: &Range<L>, at: u64) -> Range<L> {
    Range::new(
        segment.locator.clone(),
        at,
        segment.range_end() - at,
        segment.segment_offset + (at - segment.range_start),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::locators_and_ranges;

    fn ten() -> Vec<Range<&'static str>> {
        vec![Range::new("A", 0, 10, 0)]
    }

    fn assert_contiguous<L>(ranges: &[Range<L>]) {
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].range_end(), pair[1].range_start);
        }
    }

    #[test]
    fn write_at_start_of_entry() {
        let mut ranges = ten();
        replace_range(&mut ranges, 0, 3, "B", 0).unwrap();
        assert_eq!(
            ranges,
            vec![Range::new("B", 0, 3, 0), Range::new("A", 3, 7, 3)]
        );
    }

    #[test]
    fn write_at_tail_of_entry() {
        let mut ranges = ten();
        replace_range(&mut ranges, 7, 3, "B", 0).unwrap();
        assert_eq!(
            ranges,
            vec![Range::new("A", 0, 7, 0), Range::new("B", 7, 3, 0)]
        );
    }

    #[test]
    fn write_in_middle_splits_in_three() {
        let mut ranges = ten();
        replace_range(&mut ranges, 3, 3, "B", 0).unwrap();
        assert_eq!(
            ranges,
            vec![
                Range::new("A", 0, 3, 0),
                Range::new("B", 3, 3, 0),
                Range::new("A", 6, 4, 6),
            ]
        );
    }

    #[test]
    fn full_overwrite_replaces_entry() {
        let mut ranges = ten();
        replace_range(&mut ranges, 0, 10, "B", 0).unwrap();
        assert_eq!(ranges, vec![Range::new("B", 0, 10, 0)]);
    }

    #[test]
    fn write_past_end_grows_index() {
        let mut ranges = ten();
        replace_range(&mut ranges, 7, 6, "B", 0).unwrap();
        assert_eq!(
            ranges,
            vec![Range::new("A", 0, 7, 0), Range::new("B", 7, 6, 0)]
        );
        assert_eq!(total_size(&ranges), 13);
    }

    #[test]
    fn write_across_several_entries() {
        // three copies of "0123" back to back; overwrite [2, 9)
        let mut ranges = vec![
            Range::new("A", 0, 4, 0),
            Range::new("A", 4, 4, 0),
            Range::new("A", 8, 4, 0),
        ];
        replace_range(&mut ranges, 2, 7, "B", 0).unwrap();
        assert_eq!(
            ranges,
            vec![
                Range::new("A", 0, 2, 0),
                Range::new("B", 2, 7, 0),
                Range::new("A", 9, 3, 1),
            ]
        );
    }

    #[test]
    fn write_ending_on_entry_boundary_removes_entry() {
        let mut ranges = vec![
            Range::new("A", 0, 5, 0),
            Range::new("B", 5, 5, 0),
            Range::new("C", 10, 5, 0),
        ];
        replace_range(&mut ranges, 3, 7, "N", 0).unwrap();
        assert_eq!(
            ranges,
            vec![
                Range::new("A", 0, 3, 0),
                Range::new("N", 3, 7, 0),
                Range::new("C", 10, 5, 0),
            ]
        );
    }

    #[test]
    fn write_starting_on_entry_boundary() {
        let mut ranges = vec![Range::new("A", 0, 5, 0), Range::new("B", 5, 5, 0)];
        replace_range(&mut ranges, 5, 2, "N", 0).unwrap();
        assert_eq!(
            ranges,
            vec![
                Range::new("A", 0, 5, 0),
                Range::new("N", 5, 2, 0),
                Range::new("B", 7, 3, 2),
            ]
        );
    }

    #[test]
    fn append_pushes_new_entry() {
        let mut ranges = ten();
        replace_range(&mut ranges, 10, 3, "B", 0).unwrap();
        assert_eq!(
            ranges,
            vec![Range::new("A", 0, 10, 0), Range::new("B", 10, 3, 0)]
        );
    }

    #[test]
    fn append_extends_continuing_locator() {
        let mut ranges = vec![Range::new(100u64, 0, 4, 0)];
        replace_range(&mut ranges, 4, 6, 100, 4).unwrap();
        assert_eq!(ranges, vec![Range::new(100, 0, 10, 0)]);
    }

    #[test]
    fn append_does_not_extend_discontinuous_locator() {
        let mut ranges = vec![Range::new(100u64, 0, 4, 0)];
        replace_range(&mut ranges, 4, 6, 100, 10).unwrap();
        assert_eq!(ranges.len(), 2);
    }

    #[test]
    fn append_replaces_trailing_empty_entry() {
        let mut ranges = vec![Range::new("E", 0, 0, 0)];
        replace_range(&mut ranges, 0, 5, "B", 0).unwrap();
        assert_eq!(ranges, vec![Range::new("B", 0, 5, 0)]);
    }

    #[test]
    fn append_to_empty_index() {
        let mut ranges: Vec<Range<&str>> = Vec::new();
        replace_range(&mut ranges, 0, 5, "B", 0).unwrap();
        assert_eq!(ranges, vec![Range::new("B", 0, 5, 0)]);
    }

    #[test]
    fn zero_size_splice_is_noop() {
        let mut ranges = ten();
        replace_range(&mut ranges, 4, 0, "B", 0).unwrap();
        replace_range(&mut ranges, 400, 0, "B", 0).unwrap();
        assert_eq!(ranges, ten());
    }

    #[test]
    fn splice_beyond_end_is_rejected() {
        let mut ranges = ten();
        let err = replace_range(&mut ranges, 11, 2, "B", 0).unwrap_err();
        assert_eq!(
            err,
            RangeError::OutOfCoverage {
                start: 11,
                size: 2,
                covered: 10
            }
        );
        assert_eq!(ranges, ten());
    }

    #[test]
    fn splice_then_lookup_returns_new_locator() {
        let mut ranges = vec![
            Range::new("A", 0, 5, 0),
            Range::new("B", 5, 5, 0),
            Range::new("C", 10, 5, 0),
        ];
        replace_range(&mut ranges, 4, 8, "N", 20).unwrap();
        assert_contiguous(&ranges);

        let found = locators_and_ranges(&ranges, 4, 8);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].locator, "N");
        assert_eq!(found[0].segment_offset, 20);
        assert_eq!(found[0].segment_size, 8);

        // neighbours outside the splice are untouched
        assert_eq!(locators_and_ranges(&ranges, 0, 4)[0].locator, "A");
        let tail = locators_and_ranges(&ranges, 12, 3);
        assert_eq!(tail[0].locator, "C");
        assert_eq!(tail[0].segment_offset, 2);
    }
}
