//! Shared types used across the finance saga workspace.

pub mod types;

pub use types::{AccountId, CorrelationId, Money, RecordId};
