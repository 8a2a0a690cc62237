//! Synchronous record lookups against the owning service.
//!
//! Used by the delete sagas to confirm that a DELETE actually took effect:
//! a NotFound result (`Ok(None)`) is the confirmation. The resilience policy
//! wrapping the real call lives outside this crate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::RecordId;
use domain::FinancialRecord;
use thiserror::Error;

/// Errors from the record query service.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The owning service could not be reached.
    #[error("record service unavailable: {0}")]
    Unavailable(String),
}

/// Trait for fetching records by ID from the owning service.
#[async_trait]
pub trait RecordQueryService: Send + Sync {
    /// Fetches a record by ID.
    ///
    /// `Ok(None)` is the NotFound classification; any `Err` is a dependency
    /// failure distinct from NotFound.
    async fn find_record(
        &self,
        record_id: RecordId,
    ) -> Result<Option<FinancialRecord>, QueryError>;
}

#[derive(Debug, Default)]
struct InMemoryRecordQueryState {
    records: HashMap<RecordId, FinancialRecord>,
    unavailable: bool,
}

/// In-memory record query service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordQueryService {
    state: Arc<RwLock<InMemoryRecordQueryState>>,
}

impl InMemoryRecordQueryService {
    /// Creates a new empty in-memory query service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, making lookups for its ID return it.
    pub fn insert(&self, record: FinancialRecord) {
        self.state.write().unwrap().records.insert(record.id, record);
    }

    /// Removes a record, making lookups for its ID return NotFound.
    pub fn remove(&self, record_id: RecordId) {
        self.state.write().unwrap().records.remove(&record_id);
    }

    /// Configures the service to fail lookups with a dependency error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns the number of records currently held.
    pub fn record_count(&self) -> usize {
        self.state.read().unwrap().records.len()
    }
}

#[async_trait]
impl RecordQueryService for InMemoryRecordQueryService {
    async fn find_record(
        &self,
        record_id: RecordId,
    ) -> Result<Option<FinancialRecord>, QueryError> {
        let state = self.state.read().unwrap();
        if state.unavailable {
            return Err(QueryError::Unavailable("connection refused".to_string()));
        }
        Ok(state.records.get(&record_id).cloned())
    }
}
