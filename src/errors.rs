use thiserror::Error;

use crate::types::Position;

/// Error type for source construction, tracker invariants, and conformance failures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("position {requested} claimed out of order (next claim must be at least {minimum})")]
    ClaimOutOfOrder {
        minimum: Position,
        requested: Position,
    },
    #[error("range start {start} exceeds stop {stop}")]
    InvalidRange { start: Position, stop: Position },
    #[error("size estimation failed: {0}")]
    Codec(String),
    #[error("conformance check failed: {0}")]
    Conformance(String),
}
