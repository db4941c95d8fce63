use thiserror::Error;

use crate::ordering::OrderingKind;

/// Error type for invalid state operations.
///
/// Every variant is raised synchronously by the call that detected it.
/// Validation happens before any segment memory is touched, so an error
/// always leaves the previous state intact.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MusicaError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Species '{0}' is not part of the mechanism")]
    UnknownSpecies(String),
    #[error("User-defined rate parameter '{0}' is not part of the mechanism")]
    UnknownRateParameter(String),
    #[error("Wrong number of values for '{name}'. Expected {expected} (one per grid cell), got {found}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Segments cover {found} grid cells but the state was created for {expected}")]
    SegmentCountMismatch { expected: usize, found: usize },
    #[error("Segment {segment} holds {found} grid cells but the partition assigned it {expected}")]
    SegmentSizeMismatch {
        segment: usize,
        expected: usize,
        found: usize,
    },
    #[error("Segment {segment} reports a {kind} ordering that differs from segment 0")]
    OrderingMismatch { segment: usize, kind: OrderingKind },
}

/// Convenience type for `Result<T, MusicaError>`.
pub type MusicaResult<T> = Result<T, MusicaError>;
