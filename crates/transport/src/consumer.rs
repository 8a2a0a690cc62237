//! Transport consumption context.
//!
//! Drains a stream of inbound responses into the broker. Runs as its own
//! task so delivery never executes on a coordinator's context.

use futures_core::Stream;
use futures_util::StreamExt;

use crate::broker::ResponseBroker;
use crate::envelope::ResponseEnvelope;

/// Consumes `stream` to completion, delivering every response to `broker`.
///
/// Returns when the stream ends (transport shut down). Unmatched responses
/// are discarded inside the broker, so this loop never fails.
pub async fn pump_responses<S>(stream: S, broker: &ResponseBroker)
where
    S: Stream<Item = ResponseEnvelope>,
{
    futures_util::pin_mut!(stream);
    while let Some(response) = stream.next().await {
        let correlation_id = response.correlation_id;
        tracing::trace!(%correlation_id, "response received from transport");
        broker.deliver(correlation_id, response);
    }
}
