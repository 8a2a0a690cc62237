//! Asynchronous command transport for the finance saga system.
//!
//! This crate owns the wire model (command and response envelopes), the
//! `CommandEmitter` seam towards the event transport, the correlation
//! response broker that parks saga steps until their response arrives, and
//! an in-memory command bus used by tests and local wiring.

pub mod broker;
pub mod consumer;
pub mod emitter;
pub mod envelope;
pub mod error;
pub mod memory;

pub use broker::{PendingResponse, ResponseBroker};
pub use consumer::pump_responses;
pub use emitter::CommandEmitter;
pub use envelope::{CommandEnvelope, CommandEnvelopeBuilder, CommandKind, Outcome, ResponseEnvelope};
pub use error::{Result, TransportError};
pub use memory::{InMemoryCommandBus, ReplyBehavior};
