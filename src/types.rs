/// Discrete record coordinate within a source's position space.
/// Positions are dense integer indices, stable for the source's lifetime.
pub type Position = u64;
/// Estimated encoded size in abstract byte units.
/// Used only to size bundles, never as an exact byte count.
pub type ByteSize = u64;
/// Count of records or split points.
pub type RecordCount = u64;
/// Proportion of a range in `[0, 1]`.
/// Examples: `0.0` before any claim, `0.4` after claiming 4 of 10 positions.
pub type Fraction = f64;
