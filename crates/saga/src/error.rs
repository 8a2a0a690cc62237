//! Saga error taxonomy.
//!
//! Three failure classes drive compensation differently: a rejected step
//! provably did not apply, an unavailable dependency may have applied, and a
//! protocol violation is fatal and never compensated by table lookup.

use common::RecordId;
use thiserror::Error;

/// Terminal errors returned by saga coordinators.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The dependency did not acknowledge within the wait window (or the
    /// transport refused the command). The remote side effect may still have
    /// landed, so the failing step is compensated as if it had applied.
    #[error("dependency unavailable at step '{step}'")]
    DependencyUnavailable { step: &'static str },

    /// The owning service rejected the step; it provably did not apply.
    /// Carries the originating status and message verbatim.
    #[error("step '{step}' rejected ({status}): {message}")]
    Rejected {
        step: &'static str,
        status: u16,
        message: String,
    },

    /// The response violated the command/response contract. Fatal; nothing
    /// is fired by the compensation path.
    #[error("protocol violation at step '{step}': {detail}")]
    Protocol { step: &'static str, detail: String },

    /// The delete confirmation probe found the record still present.
    #[error("delete of record {record_id} not confirmed: {reason}")]
    DeleteUnconfirmed { record_id: RecordId, reason: String },

    /// The record inputs were invalid before any command was emitted.
    #[error("invalid record: {0}")]
    Record(#[from] domain::RecordError),
}

impl SagaError {
    /// HTTP-style status code reflecting the failure kind.
    pub fn status_code(&self) -> u16 {
        match self {
            SagaError::DependencyUnavailable { .. } => 424,
            SagaError::Rejected { status, .. } => *status,
            SagaError::Protocol { .. } => 502,
            SagaError::DeleteUnconfirmed { .. } => 409,
            SagaError::Record(_) => 422,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
