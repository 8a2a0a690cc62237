//! The command emitter seam towards the event transport.

use async_trait::async_trait;

use crate::envelope::CommandEnvelope;
use crate::error::TransportError;

/// Sends tagged commands to the event transport.
///
/// Implementations partition by [`CommandEnvelope::partition_key`] and attach
/// the correlation ID header when the envelope expects a reply. Emission is
/// acknowledgment-free: whether the command was *applied* is only learned
/// through the response broker.
#[async_trait]
pub trait CommandEmitter: Send + Sync {
    /// Emits a single command envelope.
    async fn emit(&self, command: CommandEnvelope) -> Result<(), TransportError>;
}
