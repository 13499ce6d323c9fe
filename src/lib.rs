#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Size-estimation codecs used to turn byte budgets into record counts.
pub mod codec;
/// Centralized tunables for the splitter and the conformance harness.
pub mod constants;
/// Conformance checks any bounded source implementation must pass.
pub mod harness;
/// Progress math and split-point accounting types.
pub mod progress;
/// Bounded source trait, in-memory source, and lazy range readers.
pub mod source;
/// Static partitioning of a range into bundles.
pub mod splitter;
/// Per-read-pass claim/split coordination.
pub mod tracker;
/// Shared type aliases.
pub mod types;

mod errors;

pub use codec::{Codec, FixedSizeCodec, JsonCodec};
pub use errors::SourceError;
pub use progress::{SplitPoints, SplitPointsRemaining};
pub use source::{BoundedSource, SourceSplit, VecSource};
pub use tracker::{RangeEnd, RangeTracker, ResidualRange};
pub use types::{ByteSize, Fraction, Position, RecordCount};
