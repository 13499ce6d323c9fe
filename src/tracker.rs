//! Range trackers: the mutable cursor and split boundary for one read pass.
//!
//! Ownership model:
//! - A tracker is created per read pass over one `[start, stop)` range and
//!   discarded when the read finishes. Independent reads of the same range
//!   each get their own tracker; trackers are never shared across passes.
//! - One reader drives `try_claim` sequentially; any number of controllers
//!   may call the split methods concurrently. All mutable state sits behind
//!   a single mutex so a claim and a shrink can never observe a torn state.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::SourceError;
use crate::progress::{self, SplitPoints, SplitPointsRemaining};
use crate::types::{Fraction, Position};

/// Upper bound of a position range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeEnd {
    /// Exclusive stop position.
    Bounded(Position),
    /// The logical end of all data, not yet pinned to a position.
    Open,
}

impl RangeEnd {
    /// The stop position, if the end is bounded.
    pub fn bounded(self) -> Option<Position> {
        match self {
            RangeEnd::Bounded(stop) => Some(stop),
            RangeEnd::Open => None,
        }
    }
}

/// Residual range handed back by an accepted dynamic split.
///
/// The caller wraps this in a new source/tracker pair for separate execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualRange {
    /// Inclusive start of the freed tail.
    pub start: Position,
    /// Exclusive stop of the freed tail (the range's previous stop).
    pub stop: Position,
}

struct TrackerState {
    stop: RangeEnd,
    last_claimed: Option<Position>,
    claimed: u64,
    /// Set once a claim is rejected at the current stop: the reader has
    /// observed that boundary, so no later split may move it.
    stop_locked: bool,
}

/// Claim/split coordinator for one contiguous position range.
pub struct RangeTracker {
    start: Position,
    state: Mutex<TrackerState>,
}

impl RangeTracker {
    /// Create a tracker for `[start, stop)`.
    pub fn new(start: Position, stop: RangeEnd) -> Result<Self, SourceError> {
        if let RangeEnd::Bounded(stop_position) = stop {
            if start > stop_position {
                return Err(SourceError::InvalidRange {
                    start,
                    stop: stop_position,
                });
            }
        }
        Ok(Self {
            start,
            state: Mutex::new(TrackerState {
                stop,
                last_claimed: None,
                claimed: 0,
                stop_locked: false,
            }),
        })
    }

    /// Inclusive start of the tracked range.
    pub fn range_start(&self) -> Position {
        self.start
    }

    /// Current exclusive stop of the tracked range.
    ///
    /// A successful dynamic split moves this downward.
    pub fn range_stop(&self) -> RangeEnd {
        self.lock_state().stop
    }

    /// Attempt to claim `position` for the reader.
    ///
    /// Returns `Ok(false)` when `position` is at or beyond the current stop,
    /// which tells the reader to stop cleanly. Claims must arrive in strictly
    /// increasing order; an out-of-order claim is an invariant violation and
    /// leaves the tracker untouched.
    pub fn try_claim(&self, position: Position) -> Result<bool, SourceError> {
        let mut state = self.lock_state();
        let minimum = Self::next_unclaimed(self.start, &state);
        if position < minimum {
            return Err(SourceError::ClaimOutOfOrder {
                minimum,
                requested: position,
            });
        }
        if let RangeEnd::Bounded(stop) = state.stop {
            if position >= stop {
                state.stop_locked = true;
                return Ok(false);
            }
        }
        state.last_claimed = Some(position);
        state.claimed += 1;
        Ok(true)
    }

    /// Attempt to shrink the range's stop to `position`.
    ///
    /// Accepted only when `position` is strictly ahead of the reader's cursor
    /// and strictly below the current stop. On acceptance the stop moves
    /// atomically and the freed `[position, old_stop)` tail is returned.
    /// Every rejection is `Ok(None)` and changes no state.
    pub fn try_split_at_position(
        &self,
        position: Position,
    ) -> Result<Option<ResidualRange>, SourceError> {
        let mut state = self.lock_state();
        Ok(self.split_locked(&mut state, position))
    }

    /// Attempt to shrink the range at `fraction` of its current extent.
    ///
    /// The fraction converts to `start + floor(fraction * (stop - start))`
    /// against the current stop, then follows the same acceptance rules as
    /// [`RangeTracker::try_split_at_position`]. Fractions outside `(0, 1)`
    /// reject cleanly.
    pub fn try_split_at_fraction(
        &self,
        fraction: Fraction,
    ) -> Result<Option<ResidualRange>, SourceError> {
        let mut state = self.lock_state();
        let Some(stop) = state.stop.bounded() else {
            debug!(fraction, "split rejected: range is open-ended");
            return Ok(None);
        };
        let Some(position) = progress::position_for_fraction(self.start, stop, fraction) else {
            debug!(fraction, "split rejected: fraction not in (0, 1)");
            return Ok(None);
        };
        Ok(self.split_locked(&mut state, position))
    }

    /// Fraction of the current range already claimed, in `[0, 1]`.
    ///
    /// `0.0` before any claim and for open-ended or zero-length ranges. A
    /// concurrent split shrinks the denominator for subsequent calls.
    pub fn fraction_consumed(&self) -> Fraction {
        let state = self.lock_state();
        match state.stop {
            RangeEnd::Bounded(stop) => {
                progress::fraction_consumed(self.start, stop, state.last_claimed)
            }
            RangeEnd::Open => 0.0,
        }
    }

    /// Consumed and remaining split-point counts for the current range.
    pub fn split_points(&self) -> SplitPoints {
        let state = self.lock_state();
        let remaining = match state.stop {
            RangeEnd::Bounded(stop) => {
                let next = Self::next_unclaimed(self.start, &state);
                SplitPointsRemaining::Known(stop.saturating_sub(next))
            }
            RangeEnd::Open => SplitPointsRemaining::Unknown,
        };
        SplitPoints {
            consumed: state.claimed,
            remaining,
        }
    }

    fn split_locked(&self, state: &mut TrackerState, position: Position) -> Option<ResidualRange> {
        let Some(stop) = state.stop.bounded() else {
            debug!(position, "split rejected: range is open-ended");
            return None;
        };
        if state.stop_locked {
            debug!(position, stop, "split rejected: stop already observed by reader");
            return None;
        }
        let minimum = Self::next_unclaimed(self.start, state);
        if position < minimum {
            debug!(position, minimum, "split rejected: position already consumed");
            return None;
        }
        if position >= stop {
            debug!(position, stop, "split rejected: position at or beyond stop");
            return None;
        }
        state.stop = RangeEnd::Bounded(position);
        debug!(position, residual_stop = stop, "dynamic split accepted");
        Some(ResidualRange {
            start: position,
            stop,
        })
    }

    fn next_unclaimed(start: Position, state: &TrackerState) -> Position {
        state.last_claimed.map(|last| last + 1).unwrap_or(start)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().expect("range tracker poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn bounded(start: Position, stop: Position) -> RangeTracker {
        RangeTracker::new(start, RangeEnd::Bounded(stop)).unwrap()
    }

    #[test]
    fn rejects_inverted_ranges() {
        assert!(matches!(
            RangeTracker::new(5, RangeEnd::Bounded(3)),
            Err(SourceError::InvalidRange { start: 5, stop: 3 })
        ));
    }

    #[test]
    fn claims_advance_in_order_until_stop() {
        let tracker = bounded(0, 3);
        assert!(tracker.try_claim(0).unwrap());
        assert!(tracker.try_claim(1).unwrap());
        assert!(tracker.try_claim(2).unwrap());
        assert!(!tracker.try_claim(3).unwrap());
    }

    #[test]
    fn out_of_order_claim_is_an_invariant_violation() {
        let tracker = bounded(0, 10);
        assert!(tracker.try_claim(4).unwrap());
        let err = tracker.try_claim(4).unwrap_err();
        assert!(matches!(
            err,
            SourceError::ClaimOutOfOrder {
                minimum: 5,
                requested: 4
            }
        ));
        // The failed claim left the cursor where it was.
        assert!(tracker.try_claim(5).unwrap());
    }

    #[test]
    fn claim_below_range_start_is_rejected_as_error() {
        let tracker = bounded(10, 20);
        assert!(tracker.try_claim(9).is_err());
        assert!(tracker.try_claim(10).unwrap());
    }

    #[test]
    fn split_ahead_of_cursor_succeeds_exactly_once() {
        let tracker = bounded(0, 10);
        assert!(tracker.try_claim(0).unwrap());
        let residual = tracker.try_split_at_position(6).unwrap().unwrap();
        assert_eq!(residual, ResidualRange { start: 6, stop: 10 });
        assert_eq!(tracker.range_stop(), RangeEnd::Bounded(6));
        // Re-requests at the same or an earlier stale position must fail.
        assert!(tracker.try_split_at_position(6).unwrap().is_none());
        assert!(tracker.try_split_at_position(8).unwrap().is_none());
        // A further split inside the shrunk range is still legal.
        let second = tracker.try_split_at_position(3).unwrap().unwrap();
        assert_eq!(second, ResidualRange { start: 3, stop: 6 });
    }

    #[test]
    fn split_at_consumed_prefix_is_rejected() {
        let tracker = bounded(0, 10);
        for position in 0..5 {
            assert!(tracker.try_claim(position).unwrap());
        }
        assert!(tracker.try_split_at_position(4).unwrap().is_none());
        assert!(tracker.try_split_at_position(5).unwrap().is_none());
        assert!(tracker.try_split_at_position(6).unwrap().is_some());
    }

    #[test]
    fn split_before_any_claim_may_take_the_whole_range() {
        let tracker = bounded(3, 9);
        let residual = tracker.try_split_at_position(3).unwrap().unwrap();
        assert_eq!(residual, ResidualRange { start: 3, stop: 9 });
        // The primary range is now empty; the first claim is rejected.
        assert!(!tracker.try_claim(3).unwrap());
    }

    #[test]
    fn observed_stop_refuses_further_splits() {
        let tracker = bounded(0, 4);
        assert!(tracker.try_claim(0).unwrap());
        assert!(tracker.try_claim(1).unwrap());
        // Reader reaches the stop and terminates early.
        assert!(!tracker.try_claim(4).unwrap());
        // Splitting below an observed stop would orphan unread records.
        assert!(tracker.try_split_at_position(3).unwrap().is_none());
    }

    #[test]
    fn fraction_splits_resolve_against_current_stop() {
        let tracker = bounded(0, 100);
        assert!(tracker.try_claim(0).unwrap());
        let first = tracker.try_split_at_fraction(0.5).unwrap().unwrap();
        assert_eq!(first, ResidualRange { start: 50, stop: 100 });
        // Same fraction, new denominator: now resolves to position 25.
        let second = tracker.try_split_at_fraction(0.5).unwrap().unwrap();
        assert_eq!(second, ResidualRange { start: 25, stop: 50 });
    }

    #[test]
    fn fraction_splits_reject_stale_and_out_of_range_fractions() {
        let tracker = bounded(0, 10);
        for position in 0..8 {
            assert!(tracker.try_claim(position).unwrap());
        }
        // floor(0.5 * 10) = 5 is already consumed.
        assert!(tracker.try_split_at_fraction(0.5).unwrap().is_none());
        assert!(tracker.try_split_at_fraction(0.0).unwrap().is_none());
        assert!(tracker.try_split_at_fraction(1.0).unwrap().is_none());
        assert!(tracker.try_split_at_fraction(-0.2).unwrap().is_none());
        assert!(tracker.try_split_at_fraction(0.9).unwrap().is_some());
    }

    #[test]
    fn progress_reflects_claims_and_shrinking_stop() {
        let tracker = bounded(0, 10);
        assert_eq!(tracker.fraction_consumed(), 0.0);
        for position in 0..4 {
            assert!(tracker.try_claim(position).unwrap());
        }
        assert_eq!(tracker.fraction_consumed(), 0.4);
        assert_eq!(
            tracker.split_points(),
            SplitPoints {
                consumed: 4,
                remaining: SplitPointsRemaining::Known(6),
            }
        );
        tracker.try_split_at_position(5).unwrap().unwrap();
        assert_eq!(tracker.fraction_consumed(), 0.8);
        assert_eq!(
            tracker.split_points(),
            SplitPoints {
                consumed: 4,
                remaining: SplitPointsRemaining::Known(1),
            }
        );
    }

    #[test]
    fn open_ended_trackers_claim_freely_but_never_split() {
        let tracker = RangeTracker::new(0, RangeEnd::Open).unwrap();
        assert!(tracker.try_claim(0).unwrap());
        assert!(tracker.try_claim(1).unwrap());
        assert_eq!(tracker.fraction_consumed(), 0.0);
        assert_eq!(
            tracker.split_points(),
            SplitPoints {
                consumed: 2,
                remaining: SplitPointsRemaining::Unknown,
            }
        );
        assert!(tracker.try_split_at_position(100).unwrap().is_none());
        assert!(tracker.try_split_at_fraction(0.5).unwrap().is_none());
    }

    #[test]
    fn concurrent_claims_and_splits_never_tear() {
        // One reader claims sequentially while a controller hammers splits.
        // Whatever interleaving occurs, every claimed position must be below
        // the final stop and the residual chain must tile the original range.
        for _ in 0..50 {
            let tracker = Arc::new(bounded(0, 1_000));
            let reader = {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    let mut claimed = Vec::new();
                    for position in 0..1_000 {
                        match tracker.try_claim(position) {
                            Ok(true) => claimed.push(position),
                            Ok(false) => break,
                            Err(err) => panic!("invariant violation: {err}"),
                        }
                    }
                    claimed
                })
            };
            let splitter = {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    let mut residuals = Vec::new();
                    for fraction in [0.9, 0.7, 0.5, 0.3] {
                        if let Some(residual) = tracker.try_split_at_fraction(fraction).unwrap() {
                            residuals.push(residual);
                        }
                    }
                    residuals
                })
            };
            let claimed = reader.join().unwrap();
            let residuals = splitter.join().unwrap();

            let final_stop = tracker.range_stop().bounded().unwrap();
            assert!(claimed.iter().all(|&position| position < final_stop));
            // Residuals chain downward from the original stop without gaps.
            let mut upper = 1_000;
            for residual in &residuals {
                assert_eq!(residual.stop, upper);
                assert!(residual.start < residual.stop);
                upper = residual.start;
            }
            assert_eq!(upper, final_stop);
        }
    }
}
