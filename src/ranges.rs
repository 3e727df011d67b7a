//! Page range bookkeeping.
//!
//! A page blob's written ranges are kept as a `Vec<PageRange>` sorted by
//! `start`, with inclusive bounds and no overlaps. Writes and clears only
//! split the boundary ranges they touch: fully covered ranges are dropped,
//! a partially covered first or last range keeps its uncovered remainder
//! with its chunk offset shifted to match. Adjacent fragments are never
//! coalesced here.

use thiserror::Error;
use tracing::debug;

use crate::models::{PageRange, PersistencyChunk};

/// Malformed range bounds handed to the range manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid range [{start}, {end}]: start is greater than end")]
    Inverted { start: u64, end: u64 },
}

fn check_bounds(start: u64, end: u64) -> Result<(), RangeError> {
    if start > end {
        return Err(RangeError::Inverted { start, end });
    }
    Ok(())
}

/// Which stored ranges a query `[start, end]` touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactedRanges {
    /// Ranges `first..=last` intersect the query.
    Span { first: usize, last: usize },
    /// Nothing intersects; a new range belongs before index `usize`.
    InsertAt(usize),
    /// Nothing intersects and every stored range lies before the query.
    Append,
}

/// Index of the first range covering or exceeding `start`.
pub fn locate_first_impacted_range(ranges: &[PageRange], start: u64) -> Option<usize> {
    let index = ranges.partition_point(|r| r.end < start);
    (index < ranges.len()).then_some(index)
}

/// Index of the last range covering or preceding `end`.
pub fn locate_last_impacted_range(ranges: &[PageRange], end: u64) -> Option<usize> {
    ranges.partition_point(|r| r.start <= end).checked_sub(1)
}

/// Finds the ranges intersecting `[start, end]`.
pub fn select_impacted_ranges(
    ranges: &[PageRange],
    start: u64,
    end: u64,
) -> Result<ImpactedRanges, RangeError> {
    check_bounds(start, end)?;

    let first = match locate_first_impacted_range(ranges, start) {
        Some(first) => first,
        None => return Ok(ImpactedRanges::Append),
    };

    Ok(match locate_last_impacted_range(ranges, end) {
        Some(last) if last >= first => ImpactedRanges::Span { first, last },
        _ => ImpactedRanges::InsertAt(first),
    })
}

/// Re-slices `range` to `[start, end]`, which must lie within it.
fn slice(range: &PageRange, start: u64, end: u64) -> PageRange {
    let chunk = &range.persistency;
    PageRange::new(
        start,
        end,
        PersistencyChunk::new(
            chunk.id.clone(),
            chunk.offset + (start - range.start),
            end - start + 1,
        ),
    )
}

/// Splices `[start, end]` out of the span, keeping boundary remainders and
/// putting `insert` between them.
fn splice(
    ranges: &mut Vec<PageRange>,
    start: u64,
    end: u64,
    insert: Option<PageRange>,
) -> Result<(), RangeError> {
    match select_impacted_ranges(ranges, start, end)? {
        ImpactedRanges::Append => ranges.extend(insert),
        ImpactedRanges::InsertAt(index) => {
            if let Some(range) = insert {
                ranges.insert(index, range);
            }
        }
        ImpactedRanges::Span { first, last } => {
            let mut replacement = Vec::with_capacity(3);

            let head = &ranges[first];
            if head.start < start {
                replacement.push(slice(head, head.start, start - 1));
            }
            replacement.extend(insert);
            let tail = &ranges[last];
            if tail.end > end {
                replacement.push(slice(tail, end + 1, tail.end));
            }

            debug!(
                first,
                last,
                inserted = replacement.len(),
                "Splicing page ranges"
            );
            ranges.splice(first..=last, replacement);
        }
    }
    Ok(())
}

/// Records `range` as written, replacing whatever it overlaps.
pub fn merge_range(ranges: &mut Vec<PageRange>, range: PageRange) -> Result<(), RangeError> {
    let (start, end) = (range.start, range.end);
    splice(ranges, start, end, Some(range))
}

/// Removes `[start, end]` from the written ranges.
pub fn clear_range(ranges: &mut Vec<PageRange>, start: u64, end: u64) -> Result<(), RangeError> {
    splice(ranges, start, end, None)
}

/// Returns the written parts of `[start, end]`, trimmed to its bounds.
pub fn cut_ranges(
    ranges: &[PageRange],
    start: u64,
    end: u64,
) -> Result<Vec<PageRange>, RangeError> {
    Ok(match select_impacted_ranges(ranges, start, end)? {
        ImpactedRanges::Span { first, last } => ranges[first..=last]
            .iter()
            .map(|r| slice(r, r.start.max(start), r.end.min(end)))
            .collect(),
        _ => Vec::new(),
    })
}

fn zero_range(start: u64, end: u64) -> PageRange {
    PageRange::new(start, end, PersistencyChunk::zero(end - start + 1))
}

/// Partitions `[start, end]` into written ranges and zero ranges for the gaps.
pub fn fill_zero_ranges(
    ranges: &[PageRange],
    start: u64,
    end: u64,
) -> Result<Vec<PageRange>, RangeError> {
    let written = cut_ranges(ranges, start, end)?;
    let mut filled = Vec::with_capacity(written.len() * 2 + 1);

    // Next offset not yet covered; `None` once u64::MAX is covered.
    let mut cursor = Some(start);
    for range in written {
        if let Some(offset) = cursor {
            if range.start > offset {
                filled.push(zero_range(offset, range.start - 1));
            }
        }
        cursor = range.end.checked_add(1);
        filled.push(range);
    }
    if let Some(offset) = cursor {
        if offset <= end {
            filled.push(zero_range(offset, end));
        }
    }

    Ok(filled)
}
