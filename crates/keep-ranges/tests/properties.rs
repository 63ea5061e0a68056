use keep_ranges::{locators_and_ranges, replace_range, total_size, Range};
use proptest::prelude::*;

/// Build an index from a list of entry sizes, one locator per entry.
fn index_from_sizes(sizes: &[u64]) -> Vec<Range<u32>> {
    let mut ranges = Vec::new();
    let mut pos = 0;
    for (i, &size) in sizes.iter().enumerate() {
        ranges.push(Range::new(i as u32, pos, size, 0));
        pos += size;
    }
    ranges
}

/// Expand an index into one `(locator, offset)` pair per covered byte.
fn expand(ranges: &[Range<u32>]) -> Vec<(u32, u64)> {
    ranges
        .iter()
        .flat_map(|r| (0..r.range_size).map(move |k| (r.locator, r.segment_offset + k)))
        .collect()
}

fn assert_contiguous(ranges: &[Range<u32>]) -> Result<(), TestCaseError> {
    let mut pos = 0;
    for r in ranges {
        prop_assert_eq!(r.range_start, pos);
        pos = r.range_end();
    }
    Ok(())
}

proptest! {
    #[test]
    fn lookup_covers_query_exactly(
        sizes in prop::collection::vec(1u64..50, 1..20),
        start in 0u64..1000,
        len in 0u64..300,
    ) {
        let ranges = index_from_sizes(&sizes);
        let total = total_size(&ranges);
        let found = locators_and_ranges(&ranges, start, len);

        let expected = if start >= total { 0 } else { len.min(total - start) };
        let got: u64 = found.iter().map(|p| p.segment_size).sum();
        prop_assert_eq!(got, expected);
        prop_assert!(found.iter().all(|p| p.segment_size > 0));
        prop_assert!(found.iter().all(|p| p.segment_offset + p.segment_size <= p.block_size));
    }

    #[test]
    fn zero_size_lookup_is_empty(
        sizes in prop::collection::vec(0u64..50, 0..20),
        start in 0u64..2000,
    ) {
        let ranges = index_from_sizes(&sizes);
        prop_assert!(locators_and_ranges(&ranges, start, 0).is_empty());
    }

    #[test]
    fn splices_match_byte_model(
        sizes in prop::collection::vec(1u64..30, 1..8),
        ops in prop::collection::vec((0u64..400, 1u64..60, 0u64..100), 1..12),
    ) {
        let mut ranges = index_from_sizes(&sizes);
        let mut model = expand(&ranges);

        for (n, (start, size, seg_off)) in ops.into_iter().enumerate() {
            let start = start % (model.len() as u64 + 1);
            let locator = 1000 + n as u32;
            replace_range(&mut ranges, start, size, locator, seg_off).unwrap();

            let end = (start + size) as usize;
            if model.len() < end {
                model.resize(end, (0, 0));
            }
            for k in 0..size {
                model[(start + k) as usize] = (locator, seg_off + k);
            }

            assert_contiguous(&ranges)?;
            prop_assert_eq!(total_size(&ranges), model.len() as u64);
            prop_assert_eq!(expand(&ranges), model.clone());
        }
    }

    #[test]
    fn splice_then_lookup_returns_new_locator(
        sizes in prop::collection::vec(1u64..40, 1..10),
        start in 0u64..400,
        size in 1u64..80,
    ) {
        let mut ranges = index_from_sizes(&sizes);
        let start = start % (total_size(&ranges) + 1);
        replace_range(&mut ranges, start, size, 9999, 7).unwrap();

        let found = locators_and_ranges(&ranges, start, size);
        prop_assert_eq!(found.len(), 1);
        prop_assert_eq!(found[0].locator, 9999);
        prop_assert_eq!(found[0].segment_offset, 7);
        prop_assert_eq!(found[0].segment_size, size);
    }

    #[test]
    fn splice_past_end_fails_without_change(
        sizes in prop::collection::vec(1u64..40, 0..10),
        gap in 1u64..100,
        size in 1u64..50,
    ) {
        let mut ranges = index_from_sizes(&sizes);
        let before = ranges.clone();
        let start = total_size(&ranges) + gap;
        prop_assert!(replace_range(&mut ranges, start, size, 9999, 0).is_err());
        prop_assert_eq!(ranges, before);
    }
}
