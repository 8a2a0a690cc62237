//! Correlation response broker.
//!
//! Maps an opaque correlation token to a pending waiter. Registration
//! happens on the coordinator's execution context; delivery happens on the
//! transport's consumption context. The waiter map is the only shared
//! mutable structure in the subsystem and is injected at construction rather
//! than held in process-global state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::CorrelationId;
use tokio::sync::oneshot;

use crate::envelope::ResponseEnvelope;
use crate::error::TransportError;

type WaiterMap = Arc<Mutex<HashMap<CorrelationId, oneshot::Sender<ResponseEnvelope>>>>;

/// Completes pending waits when their correlated responses arrive.
///
/// Cloning is cheap and shares the underlying waiter map.
#[derive(Clone, Default)]
pub struct ResponseBroker {
    waiters: WaiterMap,
}

impl ResponseBroker {
    /// Creates a new broker with an empty waiter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `correlation_id` and returns its handle.
    ///
    /// Awaiting the handle resolves to the matching response, or fails with
    /// [`TransportError::ResponseTimeout`] once `timeout` elapses. Either way
    /// the entry is removed; at most one live wait exists per correlation ID.
    pub fn register_wait(
        &self,
        correlation_id: CorrelationId,
        timeout: Duration,
    ) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let previous = self.waiters.lock().unwrap().insert(correlation_id, tx);
        if previous.is_some() {
            // Correlation IDs are freshly generated per awaited command, so a
            // collision means a caller reused one; the stale waiter is dropped.
            tracing::warn!(%correlation_id, "replaced a live wait for the same correlation id");
        }

        PendingResponse {
            correlation_id,
            timeout,
            rx,
            waiters: Arc::clone(&self.waiters),
        }
    }

    /// Delivers a response received from the transport.
    ///
    /// Completes the matching waiter if one exists; unknown or
    /// already-resolved correlation IDs (duplicate or late deliveries) are
    /// logged and discarded.
    pub fn deliver(&self, correlation_id: CorrelationId, response: ResponseEnvelope) {
        let waiter = self.waiters.lock().unwrap().remove(&correlation_id);
        match waiter {
            Some(tx) => {
                if tx.send(response).is_err() {
                    tracing::debug!(%correlation_id, "waiter gone before delivery, discarding");
                    metrics::counter!("responses_discarded_total").increment(1);
                }
            }
            None => {
                tracing::debug!(%correlation_id, "no pending wait for response, discarding");
                metrics::counter!("responses_discarded_total").increment(1);
            }
        }
    }

    /// Returns the number of waits currently outstanding.
    pub fn pending_count(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }
}

/// Handle for one registered wait.
pub struct PendingResponse {
    correlation_id: CorrelationId,
    timeout: Duration,
    rx: oneshot::Receiver<ResponseEnvelope>,
    waiters: WaiterMap,
}

impl PendingResponse {
    /// Returns the correlation ID this wait is registered under.
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Deregisters the wait without consuming a response.
    ///
    /// Used when the command could not be emitted after the wait was already
    /// registered.
    pub fn cancel(self) {
        self.waiters.lock().unwrap().remove(&self.correlation_id);
    }

    /// Suspends until the matching response arrives or the timeout elapses.
    ///
    /// A timeout removes the wait entry but sends no cancel signal for the
    /// in-flight command.
    pub async fn wait(self) -> Result<ResponseEnvelope, TransportError> {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::ChannelClosed(self.correlation_id)),
            Err(_) => {
                self.waiters.lock().unwrap().remove(&self.correlation_id);
                Err(TransportError::ResponseTimeout {
                    correlation_id: self.correlation_id,
                    timeout: self.timeout,
                })
            }
        }
    }
}
