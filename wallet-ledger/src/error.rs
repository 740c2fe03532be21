//! Error types for the wallet ledger.

use thiserror::Error;

use crate::coin_selection::SelectionError;

/// Errors produced while parsing or converting amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    Invalid(String),

    #[error("Amount {0} has more than 8 decimal places")]
    TooPrecise(String),

    #[error("Amount out of range: {0}")]
    Overflow(String),

    #[error("Unknown denomination: {0}")]
    UnknownDenomination(String),
}

/// Errors produced by HD path parsing and path algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Paths must have exactly six `/`-separated parts (`m` plus five levels).
    #[error("Invalid HD path {path}: expected 6 segments, found {found}")]
    SegmentCount {
        path: String,
        found: usize,
    },

    #[error("Invalid HD path {path}: bad segment {segment:?}")]
    InvalidSegment {
        path: String,
        segment: String,
    },

    #[error("Unsupported purpose {0}")]
    UnsupportedPurpose(String),

    #[error("Path index overflow: {0}")]
    IndexOverflow(String),
}

/// Top level error for the ledger crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),
}

/// Type alias for Result with the ledger [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
