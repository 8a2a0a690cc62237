//! Saga orchestration for multi-step financial operations.
//!
//! Every create/update/delete of an expense, income, or transfer is executed
//! as a sequence of asynchronous commands against the owning services. Each
//! step emits one command and suspends on the correlation broker until the
//! matching response arrives (or the wait times out). On partial failure the
//! coordinator looks up the compensation table for the state it reached and
//! fires the inverse commands, most recent effect first.
//!
//! Saga runs are ephemeral and process-local: a crash mid-run abandons the
//! run together with its knowledge of what must be undone.

pub mod commands;
pub mod compensation;
pub mod config;
pub mod error;
pub mod pool;
pub mod record;
pub mod services;
pub mod state;
pub mod step;
pub mod transfer;

pub use config::SagaConfig;
pub use error::SagaError;
pub use pool::SagaPool;
pub use record::RecordSagaCoordinator;
pub use services::{InMemoryRecordQueryService, QueryError, RecordQueryService};
pub use state::{RecordSagaState, TransferSagaState};
pub use step::{StepExecutor, StepFailure, StepOutcome};
pub use transfer::TransferSagaCoordinator;
