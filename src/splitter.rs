//! Static bundle partitioning.
//!
//! Pure, deterministic math over `(range, total_size, desired_bundle_size)`.
//! The invariant that matters: concatenating the produced ranges, in order,
//! tiles the input range exactly.

use tracing::debug;

use crate::constants::splitter::TAIL_ABSORB_DIVISOR;
use crate::types::{ByteSize, Position, RecordCount};

/// Number of records per bundle for a byte budget.
///
/// Rounds `desired_bundle_size / average_record_size` half away from zero,
/// with a floor of one record so a bundle always makes progress.
pub fn records_per_bundle(
    total_records: RecordCount,
    total_size: ByteSize,
    desired_bundle_size: ByteSize,
) -> RecordCount {
    if total_records == 0 || total_size == 0 {
        return 1;
    }
    let average_record_size = total_size as f64 / total_records as f64;
    let per_bundle = (desired_bundle_size as f64 / average_record_size).round() as RecordCount;
    per_bundle.max(1)
}

/// Partition `[start, stop)` into contiguous bundle ranges.
///
/// Bundles hold `records_per_bundle` positions each; a short tail either
/// forms the final bundle or, when shorter than a quarter bundle, folds into
/// the previous one. Degenerate inputs (fewer than two records, no size
/// estimate, or a budget covering the whole source) produce a single range
/// spanning the input, so callers always receive at least one unit of work.
pub fn bundle_ranges(
    start: Position,
    stop: Position,
    total_size: ByteSize,
    desired_bundle_size: ByteSize,
) -> Vec<(Position, Position)> {
    let total_records = stop.saturating_sub(start);
    if total_records < 2 || total_size == 0 || desired_bundle_size >= total_size {
        return vec![(start, stop)];
    }
    let per_bundle = records_per_bundle(total_records, total_size, desired_bundle_size);
    let mut ranges = Vec::new();
    let mut cursor = start;
    while cursor < stop {
        let mut end = (cursor + per_bundle).min(stop);
        let remaining = stop - end;
        if remaining > 0 && remaining < per_bundle / TAIL_ABSORB_DIVISOR {
            end = stop;
        }
        ranges.push((cursor, end));
        cursor = end;
    }
    debug!(
        start,
        stop,
        per_bundle,
        bundle_count = ranges.len(),
        "partitioned range into bundles"
    );
    ranges
}
