//! Transport error types.

use std::time::Duration;

use common::CorrelationId;
use thiserror::Error;

/// Errors that can occur in the command transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response arrived within the configured wait window.
    ///
    /// The already-sent command is not cancelled; the remote side effect may
    /// still land after this error is raised.
    #[error("no response within {timeout:?} for correlation {correlation_id}")]
    ResponseTimeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// The waiter was dropped before a response could be delivered.
    #[error("response channel closed for correlation {0}")]
    ChannelClosed(CorrelationId),

    /// The transport refused the command outright (e.g. circuit open).
    #[error("command transport unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for transport results.
pub type Result<T> = std::result::Result<T, TransportError>;
