//! Conformance checks for bounded source implementations.
//!
//! Every check is generic over [`BoundedSource`] and returns
//! `Err(SourceError::Conformance)` with a description when a property fails,
//! so test suites can drive them with `?` or `unwrap`. The exhaustive split
//! sweep fans independent scenarios out across a rayon pool; the contended
//! variant races a real reader thread against a controller thread.

use std::fmt::Debug;
use std::thread;

use rayon::prelude::*;
use tracing::debug;

use crate::constants::harness::{CONTENDED_TRIALS_PER_FRACTION, FRACTION_STEPS_PER_POSITION};
use crate::errors::SourceError;
use crate::source::{BoundedSource, SourceSplit};
use crate::tracker::ResidualRange;
use crate::types::{Fraction, Position};

/// Tuning for [`assert_split_at_fraction_exhaustive`].
#[derive(Clone, Debug)]
pub struct ExhaustiveSplitConfig {
    /// Fraction grid steps per record position; higher is finer.
    pub fraction_steps_per_position: u32,
    /// Also run the contended reader-vs-controller scenarios.
    pub multi_threaded: bool,
    /// Contended trials per fraction when `multi_threaded` is set.
    pub trials_per_fraction: u32,
}

impl Default for ExhaustiveSplitConfig {
    fn default() -> Self {
        Self {
            fraction_steps_per_position: FRACTION_STEPS_PER_POSITION,
            multi_threaded: false,
            trials_per_fraction: CONTENDED_TRIALS_PER_FRACTION,
        }
    }
}

/// Materialize a full read of `[start, stop)` on a fresh tracker.
///
/// The other checks use this as ground truth.
pub fn read_all<S>(
    source: &S,
    start: Option<Position>,
    stop: Option<Position>,
) -> Result<Vec<S::Record>, SourceError>
where
    S: BoundedSource,
{
    let tracker = source.range_tracker(start, stop)?;
    source.read(&tracker).collect()
}

/// Check that a split list reproduces the parent source exactly.
///
/// Fails when consecutive splits leave a gap or overlap, or when the
/// concatenated split reads differ from the parent's full read in content or
/// order.
pub fn assert_reference_equivalence<S>(
    source: &S,
    splits: &[SourceSplit<S>],
) -> Result<(), SourceError>
where
    S: BoundedSource,
    S::Record: PartialEq + Debug,
{
    for pair in splits.windows(2) {
        if pair[0].stop.bounded() != Some(pair[1].start) {
            return Err(SourceError::Conformance(format!(
                "split boundary mismatch: stop {:?} followed by start {}",
                pair[0].stop, pair[1].start
            )));
        }
    }
    let expected = read_all(source, None, None)?;
    let mut stitched = Vec::with_capacity(expected.len());
    for split in splits {
        stitched.extend(read_all(&split.source, Some(split.start), split.stop.bounded())?);
    }
    if stitched != expected {
        return Err(SourceError::Conformance(format!(
            "concatenated split reads diverge from the reference read: got {stitched:?}, expected {expected:?}"
        )));
    }
    Ok(())
}

/// Check that reads over `[start, stop)` are reentrant.
///
/// For every interruption point, a complete independent read is performed
/// while another read of the same range is mid-flight; both must match the
/// reference sequence, proving the passes share no mutable state.
pub fn assert_reentrant_reads_succeed<S>(
    source: &S,
    start: Option<Position>,
    stop: Option<Position>,
) -> Result<(), SourceError>
where
    S: BoundedSource,
    S::Record: PartialEq + Debug,
{
    let expected = read_all(source, start, stop)?;
    for interrupt_at in 0..=expected.len() {
        let outer_tracker = source.range_tracker(start, stop)?;
        let mut outer = source.read(&outer_tracker);
        let mut first = Vec::with_capacity(expected.len());
        for _ in 0..interrupt_at {
            match outer.next() {
                Some(record) => first.push(record?),
                None => break,
            }
        }
        let inner = read_all(source, start, stop)?;
        if inner != expected {
            return Err(SourceError::Conformance(format!(
                "read started after {interrupt_at} records of another pass diverged: got {inner:?}, expected {expected:?}"
            )));
        }
        for record in outer {
            first.push(record?);
        }
        if first != expected {
            return Err(SourceError::Conformance(format!(
                "read interrupted at {interrupt_at} records did not resume to the reference sequence: got {first:?}, expected {expected:?}"
            )));
        }
    }
    Ok(())
}

/// Drive the dynamic split protocol across the whole fraction space.
///
/// For every read-prefix length and every fraction on a grid finer than one
/// step per position, a split attempt must either succeed with the primary
/// and residual reads reconstituting the reference sequence, or reject
/// cleanly with the primary read alone reconstituting it. With
/// `config.multi_threaded`, each fraction is additionally raced against a
/// live reader; across those trials both accepted and rejected outcomes must
/// be observed.
pub fn assert_split_at_fraction_exhaustive<S>(
    source: &S,
    config: &ExhaustiveSplitConfig,
) -> Result<(), SourceError>
where
    S: BoundedSource + Sync,
    S::Record: PartialEq + Debug + Send + Sync,
{
    let expected = read_all(source, None, None)?;
    let total = expected.len();
    let steps = (total.max(1) as u32) * config.fraction_steps_per_position.max(1);
    let fractions: Vec<Fraction> = (1..steps).map(|k| f64::from(k) / f64::from(steps)).collect();

    let scenarios: Vec<(usize, Fraction)> = (0..=total)
        .flat_map(|prefix| fractions.iter().map(move |&fraction| (prefix, fraction)))
        .collect();
    scenarios
        .par_iter()
        .try_for_each(|&(prefix, fraction)| check_split_scenario(source, &expected, prefix, fraction))?;

    if config.multi_threaded {
        let mut accepted = 0u32;
        let mut rejected = 0u32;
        for &fraction in &fractions {
            for trial in 0..config.trials_per_fraction.max(1) {
                // Vary the prefix so the race starts from different cursors.
                let prefix = trial as usize % (total + 1);
                if check_contended_scenario(source, &expected, prefix, fraction)? {
                    accepted += 1;
                } else {
                    rejected += 1;
                }
            }
        }
        debug!(accepted, rejected, "contended split sweep finished");
        if total > 1 && (accepted == 0 || rejected == 0) {
            return Err(SourceError::Conformance(format!(
                "contended sweep saw {accepted} accepted and {rejected} rejected splits; both outcomes are required"
            )));
        }
    }
    Ok(())
}

/// One deterministic scenario: read `prefix` records, attempt one split,
/// then require reconstitution.
fn check_split_scenario<S>(
    source: &S,
    expected: &[S::Record],
    prefix: usize,
    fraction: Fraction,
) -> Result<(), SourceError>
where
    S: BoundedSource,
    S::Record: PartialEq + Debug,
{
    let tracker = source.range_tracker(None, None)?;
    let mut reader = source.read(&tracker);
    let mut primary = Vec::with_capacity(expected.len());
    for _ in 0..prefix {
        match reader.next() {
            Some(record) => primary.push(record?),
            None => break,
        }
    }
    let residual = tracker.try_split_at_fraction(fraction)?;
    for record in reader {
        primary.push(record?);
    }
    verify_reconstitution(source, expected, primary, residual, prefix, fraction)
}

/// One contended scenario: a controller races the reader for the same
/// tracker. Returns whether the split was accepted.
fn check_contended_scenario<S>(
    source: &S,
    expected: &[S::Record],
    prefix: usize,
    fraction: Fraction,
) -> Result<bool, SourceError>
where
    S: BoundedSource + Sync,
    S::Record: PartialEq + Debug + Send,
{
    let tracker = source.range_tracker(None, None)?;
    let mut reader = source.read(&tracker);
    let mut primary = Vec::with_capacity(expected.len());
    for _ in 0..prefix {
        match reader.next() {
            Some(record) => primary.push(record?),
            None => break,
        }
    }
    let (split_outcome, tail) = thread::scope(|scope| {
        let controller = scope.spawn(|| tracker.try_split_at_fraction(fraction));
        let mut tail = Vec::new();
        let mut read_error = None;
        for record in reader {
            match record {
                Ok(record) => {
                    tail.push(record);
                    thread::yield_now();
                }
                Err(err) => {
                    read_error = Some(err);
                    break;
                }
            }
        }
        let outcome = controller
            .join()
            .unwrap_or_else(|_| Err(SourceError::Conformance("controller thread panicked".into())));
        match read_error {
            Some(err) => (Err(err), tail),
            None => (outcome, tail),
        }
    });
    let residual = split_outcome?;
    primary.extend(tail);
    let accepted = residual.is_some();
    verify_reconstitution(source, expected, primary, residual, prefix, fraction)?;
    Ok(accepted)
}

fn verify_reconstitution<S>(
    source: &S,
    expected: &[S::Record],
    primary: Vec<S::Record>,
    residual: Option<ResidualRange>,
    prefix: usize,
    fraction: Fraction,
) -> Result<(), SourceError>
where
    S: BoundedSource,
    S::Record: PartialEq + Debug,
{
    match residual {
        Some(range) => {
            let mut stitched = primary;
            stitched.extend(read_all(source, Some(range.start), Some(range.stop))?);
            if stitched != expected {
                return Err(SourceError::Conformance(format!(
                    "split at fraction {fraction} after {prefix} records lost or duplicated data: got {stitched:?}, expected {expected:?}"
                )));
            }
        }
        None => {
            if primary != expected {
                return Err(SourceError::Conformance(format!(
                    "rejected split at fraction {fraction} after {prefix} records altered the read: got {primary:?}, expected {expected:?}"
                )));
            }
        }
    }
    Ok(())
}
