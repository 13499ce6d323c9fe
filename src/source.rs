//! Bounded sources and their lazy range readers.
//!
//! Ownership model:
//! - A source is an immutable value over a shared record collection; splits
//!   and residual handoffs produce new source values referencing narrowed
//!   views of the same allocation, never copies of the data.
//! - All mutable read state lives in the per-pass [`RangeTracker`], which is
//!   what makes concurrent and reentrant reads structurally safe.

use std::sync::Arc;

use tracing::debug;

use crate::codec::Codec;
use crate::errors::SourceError;
use crate::splitter;
use crate::tracker::{RangeEnd, RangeTracker};
use crate::types::{ByteSize, Position};

/// A finite, ordered, splittable record source.
///
/// Implementations carry no mutable state; every read pass goes through a
/// fresh tracker obtained from [`BoundedSource::range_tracker`].
pub trait BoundedSource: Send + Sync {
    /// Record type produced by reads.
    type Record;

    /// Best-effort estimate of the encoded size of the source's full range.
    fn total_size(&self) -> ByteSize;

    /// Partition the source's range into contiguous bundles whose estimated
    /// size is close to `desired_bundle_size`, preserving record order.
    fn split(&self, desired_bundle_size: ByteSize) -> Result<Vec<SourceSplit<Self>>, SourceError>
    where
        Self: Sized;

    /// Create a tracker for one read pass over `[start, stop)`.
    ///
    /// `start` defaults to the source's own start; `stop` defaults to the
    /// source's full extent, which stands in for an open end so progress
    /// queries stay exact.
    fn range_tracker(
        &self,
        start: Option<Position>,
        stop: Option<Position>,
    ) -> Result<RangeTracker, SourceError>;

    /// Lazily read records, claiming each position via `tracker` before it is
    /// yielded. Iteration ends cleanly at the first rejected claim; no
    /// partial or duplicate record is ever surfaced. The sequence is finite
    /// and not restartable: a new read requires a new tracker.
    fn read<'a>(
        &'a self,
        tracker: &'a RangeTracker,
    ) -> Box<dyn Iterator<Item = Result<Self::Record, SourceError>> + 'a>;
}

/// One contiguous sub-range of a parent source.
///
/// For a split sequence produced by [`BoundedSource::split`], the start of
/// each split equals the stop of the previous one, the first start equals the
/// parent's start, and the last stop equals the parent's stop.
#[derive(Clone, Debug)]
pub struct SourceSplit<S> {
    /// Source view covering exactly `[start, stop)`.
    pub source: S,
    /// Inclusive start position.
    pub start: Position,
    /// Exclusive stop position, or the open-end sentinel.
    pub stop: RangeEnd,
    /// Estimated encoded size of this bundle, for planner weighting.
    pub size_estimate: ByteSize,
}

/// In-memory bounded source over a shared record vector.
///
/// The collection sits behind an `Arc`, so cloning a source or narrowing it
/// to a sub-range shares the allocation. Positions index the full parent
/// collection even in narrowed views.
pub struct VecSource<T, C> {
    records: Arc<[T]>,
    codec: Arc<C>,
    start: Position,
    stop: Position,
    total_size: ByteSize,
}

impl<T, C> Clone for VecSource<T, C> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            codec: Arc::clone(&self.codec),
            start: self.start,
            stop: self.stop,
            total_size: self.total_size,
        }
    }
}

impl<T, C> VecSource<T, C>
where
    C: Codec<T>,
{
    /// Build a source spanning all of `records`, estimating sizes via `codec`.
    pub fn from_records(records: Vec<T>, codec: C) -> Result<Self, SourceError> {
        let records: Arc<[T]> = records.into();
        let codec = Arc::new(codec);
        let stop = records.len() as Position;
        let total_size = Self::estimate_span(&records, &*codec, 0, stop)?;
        Ok(Self {
            records,
            codec,
            start: 0,
            stop,
            total_size,
        })
    }

    /// A new source value covering `[start, stop)` of the same collection.
    ///
    /// This is how an accepted dynamic split's residual range becomes a
    /// standalone unit of work.
    pub fn with_range(&self, start: Position, stop: Position) -> Result<Self, SourceError> {
        if start > stop || stop > self.records.len() as Position {
            return Err(SourceError::InvalidRange { start, stop });
        }
        let total_size = Self::estimate_span(&self.records, &*self.codec, start, stop)?;
        Ok(Self {
            records: Arc::clone(&self.records),
            codec: Arc::clone(&self.codec),
            start,
            stop,
            total_size,
        })
    }

    /// Inclusive start of this source's range.
    pub fn start_position(&self) -> Position {
        self.start
    }

    /// Exclusive stop of this source's range.
    pub fn stop_position(&self) -> Position {
        self.stop
    }

    fn estimate_span(
        records: &[T],
        codec: &C,
        start: Position,
        stop: Position,
    ) -> Result<ByteSize, SourceError> {
        let mut total = 0;
        for record in &records[start as usize..stop as usize] {
            total += codec.estimated_size(record)?;
        }
        Ok(total)
    }
}

impl<T, C> BoundedSource for VecSource<T, C>
where
    T: Clone + Send + Sync,
    C: Codec<T>,
{
    type Record = T;

    fn total_size(&self) -> ByteSize {
        self.total_size
    }

    fn split(&self, desired_bundle_size: ByteSize) -> Result<Vec<SourceSplit<Self>>, SourceError> {
        let ranges =
            splitter::bundle_ranges(self.start, self.stop, self.total_size, desired_bundle_size);
        let mut splits = Vec::with_capacity(ranges.len());
        for (start, stop) in ranges {
            let source = self.with_range(start, stop)?;
            let size_estimate = source.total_size;
            splits.push(SourceSplit {
                source,
                start,
                stop: RangeEnd::Bounded(stop),
                size_estimate,
            });
        }
        debug!(
            desired_bundle_size,
            split_count = splits.len(),
            "split source into bundles"
        );
        Ok(splits)
    }

    fn range_tracker(
        &self,
        start: Option<Position>,
        stop: Option<Position>,
    ) -> Result<RangeTracker, SourceError> {
        let start = start.unwrap_or(self.start);
        let stop = stop.unwrap_or(self.stop);
        RangeTracker::new(start, RangeEnd::Bounded(stop))
    }

    fn read<'a>(
        &'a self,
        tracker: &'a RangeTracker,
    ) -> Box<dyn Iterator<Item = Result<T, SourceError>> + 'a> {
        Box::new(RangeReader {
            records: &self.records,
            tracker,
            position: tracker.range_start(),
            live: true,
        })
    }
}

/// Lazy record iterator for one read pass.
///
/// Each step claims the next position before yielding its record; the first
/// rejected claim (a concurrent split moved the stop) or the end of the data
/// ends the sequence.
struct RangeReader<'a, T> {
    records: &'a [T],
    tracker: &'a RangeTracker,
    position: Position,
    live: bool,
}

impl<T: Clone> Iterator for RangeReader<'_, T> {
    type Item = Result<T, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.live {
            return None;
        }
        let position = self.position;
        if position >= self.records.len() as Position {
            // Logical end of all data; nothing left to claim.
            self.live = false;
            return None;
        }
        match self.tracker.try_claim(position) {
            Ok(true) => {
                self.position += 1;
                Some(Ok(self.records[position as usize].clone()))
            }
            Ok(false) => {
                self.live = false;
                None
            }
            Err(err) => {
                self.live = false;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FixedSizeCodec;

    fn number_source(count: u64) -> VecSource<u64, FixedSizeCodec> {
        VecSource::from_records((0..count).collect(), FixedSizeCodec::new(10)).unwrap()
    }

    fn collect(
        source: &VecSource<u64, FixedSizeCodec>,
        tracker: &RangeTracker,
    ) -> Vec<u64> {
        source
            .read(tracker)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn full_read_yields_every_record_in_order() {
        let source = number_source(10);
        let tracker = source.range_tracker(None, None).unwrap();
        assert_eq!(collect(&source, &tracker), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn narrowed_views_share_the_allocation() {
        let source = number_source(10);
        let view = source.with_range(4, 8).unwrap();
        assert!(Arc::ptr_eq(&source.records, &view.records));
        assert_eq!(view.total_size(), 40);
        let tracker = view.range_tracker(None, None).unwrap();
        assert_eq!(collect(&view, &tracker), vec![4, 5, 6, 7]);
    }

    #[test]
    fn with_range_rejects_out_of_bounds_views() {
        let source = number_source(10);
        assert!(source.with_range(4, 11).is_err());
        assert!(source.with_range(8, 4).is_err());
    }

    #[test]
    fn splits_tile_the_parent_range() {
        let source = number_source(10);
        let splits = source.split(30).unwrap();
        assert_eq!(splits.first().unwrap().start, 0);
        assert_eq!(splits.last().unwrap().stop, RangeEnd::Bounded(10));
        for pair in splits.windows(2) {
            assert_eq!(RangeEnd::Bounded(pair[1].start), pair[0].stop);
        }
        let total: ByteSize = splits.iter().map(|split| split.size_estimate).sum();
        assert_eq!(total, source.total_size());
    }

    #[test]
    fn empty_source_produces_one_zero_length_split() {
        let source = number_source(0);
        let splits = source.split(100).unwrap();
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].start, 0);
        assert_eq!(splits[0].stop, RangeEnd::Bounded(0));
        let tracker = splits[0]
            .source
            .range_tracker(Some(0), Some(0))
            .unwrap();
        assert!(collect(&splits[0].source, &tracker).is_empty());
    }

    #[test]
    fn read_stops_cleanly_when_a_split_shrinks_the_range() {
        let source = number_source(10);
        let tracker = source.range_tracker(None, None).unwrap();
        let mut reader = source.read(&tracker);
        let mut primary = vec![reader.next().unwrap().unwrap()];
        let residual = tracker.try_split_at_position(4).unwrap().unwrap();
        for record in reader {
            primary.push(record.unwrap());
        }
        assert_eq!(primary, vec![0, 1, 2, 3]);

        let residual_source = source.with_range(residual.start, residual.stop).unwrap();
        let residual_tracker = residual_source.range_tracker(None, None).unwrap();
        assert_eq!(collect(&residual_source, &residual_tracker), vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn caller_supplied_stop_beyond_data_ends_at_the_data() {
        let source = number_source(3);
        let tracker = source.range_tracker(Some(0), Some(100)).unwrap();
        assert_eq!(collect(&source, &tracker), vec![0, 1, 2]);
    }
}
