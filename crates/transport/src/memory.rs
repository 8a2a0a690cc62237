//! In-memory command bus for tests and local wiring.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::broker::ResponseBroker;
use crate::emitter::CommandEmitter;
use crate::envelope::{CommandEnvelope, CommandKind, ResponseEnvelope};
use crate::error::TransportError;

/// How the bus answers an awaited command of a given kind.
#[derive(Debug, Clone)]
pub enum ReplyBehavior {
    /// Acknowledge with a success response (the default).
    Succeed,

    /// Reply with an error outcome carrying the given status and message.
    Reject { status: u16, message: String },

    /// Never reply; the waiter runs into its timeout.
    Silent,

    /// Reply with a contract-violating response (error outcome, success status).
    Malformed,

    /// Refuse the emission itself, as an open circuit breaker would.
    EmitError,
}

#[derive(Default)]
struct BusState {
    emitted: Vec<CommandEnvelope>,
    behaviors: HashMap<CommandKind, ReplyBehavior>,
}

/// In-memory [`CommandEmitter`] that records every emitted envelope and
/// answers awaited commands through the injected broker according to
/// per-kind scripted behaviors.
#[derive(Clone)]
pub struct InMemoryCommandBus {
    broker: ResponseBroker,
    state: Arc<Mutex<BusState>>,
}

impl InMemoryCommandBus {
    /// Creates a bus replying through `broker`.
    pub fn new(broker: ResponseBroker) -> Self {
        Self {
            broker,
            state: Arc::new(Mutex::new(BusState::default())),
        }
    }

    /// Scripts the reply behavior for commands of `kind`.
    pub fn set_behavior(&self, kind: CommandKind, behavior: ReplyBehavior) {
        self.state.lock().unwrap().behaviors.insert(kind, behavior);
    }

    /// Returns every envelope emitted so far, in emission order.
    pub fn emitted(&self) -> Vec<CommandEnvelope> {
        self.state.lock().unwrap().emitted.clone()
    }

    /// Returns the kinds of every emitted envelope, in emission order.
    pub fn emitted_kinds(&self) -> Vec<CommandKind> {
        self.state
            .lock()
            .unwrap()
            .emitted
            .iter()
            .map(|envelope| envelope.kind)
            .collect()
    }

    /// Returns the number of envelopes emitted so far.
    pub fn emitted_count(&self) -> usize {
        self.state.lock().unwrap().emitted.len()
    }
}

#[async_trait]
impl CommandEmitter for InMemoryCommandBus {
    async fn emit(&self, command: CommandEnvelope) -> Result<(), TransportError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            let behavior = state
                .behaviors
                .get(&command.kind)
                .cloned()
                .unwrap_or(ReplyBehavior::Succeed);

            if let ReplyBehavior::EmitError = behavior {
                return Err(TransportError::Unavailable(format!(
                    "circuit open for {} commands",
                    command.kind
                )));
            }

            let reply = command.correlation_id.map(|cid| (cid, behavior));
            state.emitted.push(command);
            reply
        };

        if let Some((correlation_id, behavior)) = reply {
            match behavior {
                ReplyBehavior::Succeed => {
                    self.broker
                        .deliver(correlation_id, ResponseEnvelope::success(correlation_id));
                }
                ReplyBehavior::Reject { status, message } => {
                    self.broker.deliver(
                        correlation_id,
                        ResponseEnvelope::error(correlation_id, status, message),
                    );
                }
                ReplyBehavior::Malformed => {
                    self.broker.deliver(
                        correlation_id,
                        ResponseEnvelope::error(correlation_id, 200, "malformed"),
                    );
                }
                ReplyBehavior::Silent => {}
                ReplyBehavior::EmitError => unreachable!("handled before recording"),
            }
        }

        Ok(())
    }
}
