//! Progress and fraction math shared by trackers and their consumers.
//!
//! All arithmetic here is pure so scheduling decisions stay deterministic:
//! the tracker serializes access to its mutable state and delegates the
//! actual position math to these helpers.

use serde::{Deserialize, Serialize};

use crate::types::{Fraction, Position, RecordCount};

/// Remaining split points in a range, when the range's extent is known.
///
/// Open-ended ranges report `Unknown` rather than a sentinel count so
/// consumers must handle the case explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitPointsRemaining {
    /// Exact number of unclaimed positions below the current stop.
    Known(RecordCount),
    /// The range's true extent is not yet determined.
    Unknown,
}

/// Snapshot of a range's divisible-work accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPoints {
    /// Number of positions claimed so far.
    pub consumed: RecordCount,
    /// Positions still claimable below the current stop.
    pub remaining: SplitPointsRemaining,
}

/// Convert a fraction of `[start, stop)` into an absolute position.
///
/// Returns `None` for fractions outside the open interval `(0, 1)` and for
/// degenerate ranges; both are clean rejections, not errors.
pub fn position_for_fraction(
    start: Position,
    stop: Position,
    fraction: Fraction,
) -> Option<Position> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return None;
    }
    if stop <= start {
        return None;
    }
    let span = (stop - start) as f64;
    Some(start + (fraction * span).floor() as Position)
}

/// Fraction of `[start, stop)` covered once `last_claimed` has been claimed.
///
/// `0.0` before any claim and for degenerate ranges.
pub fn fraction_consumed(
    start: Position,
    stop: Position,
    last_claimed: Option<Position>,
) -> Fraction {
    let Some(last_claimed) = last_claimed else {
        return 0.0;
    };
    if stop <= start {
        return 0.0;
    }
    (last_claimed + 1).saturating_sub(start) as f64 / (stop - start) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_maps_to_floored_position() {
        assert_eq!(position_for_fraction(0, 10, 0.5), Some(5));
        assert_eq!(position_for_fraction(0, 10, 0.05), Some(0));
        assert_eq!(position_for_fraction(0, 10, 0.99), Some(9));
        assert_eq!(position_for_fraction(20, 30, 0.25), Some(22));
    }

    #[test]
    fn out_of_interval_fractions_are_rejected() {
        assert_eq!(position_for_fraction(0, 10, 0.0), None);
        assert_eq!(position_for_fraction(0, 10, 1.0), None);
        assert_eq!(position_for_fraction(0, 10, -0.5), None);
        assert_eq!(position_for_fraction(0, 10, 1.5), None);
        assert_eq!(position_for_fraction(0, 10, f64::NAN), None);
    }

    #[test]
    fn degenerate_ranges_have_no_split_position() {
        assert_eq!(position_for_fraction(5, 5, 0.5), None);
    }

    #[test]
    fn consumed_fraction_counts_whole_claimed_positions() {
        assert_eq!(fraction_consumed(0, 10, None), 0.0);
        assert_eq!(fraction_consumed(0, 10, Some(0)), 0.1);
        assert_eq!(fraction_consumed(0, 10, Some(3)), 0.4);
        assert_eq!(fraction_consumed(0, 10, Some(9)), 1.0);
        assert_eq!(fraction_consumed(4, 4, None), 0.0);
    }
}
