//! Domain error types.

use thiserror::Error;

/// Errors raised while constructing or mutating financial records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// Record amounts are positive magnitudes; the entry kind carries the sign.
    #[error("record amount must be positive, got {0} cents")]
    NonPositiveAmount(i64),

    /// A transfer needs two distinct accounts.
    #[error("transfer source and target accounts must differ")]
    SameAccountTransfer,

    /// The record is not a transfer but a transfer-only operation was requested.
    #[error("record {0} is not a transfer")]
    NotATransfer(common::RecordId),

    /// A transfer record was routed to the single-account workflow.
    #[error("record {0} is a transfer")]
    UnexpectedTransfer(common::RecordId),
}
