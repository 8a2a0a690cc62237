//! External service traits and in-memory implementations consumed by sagas.

pub mod records;

pub use records::{InMemoryRecordQueryService, QueryError, RecordQueryService};
