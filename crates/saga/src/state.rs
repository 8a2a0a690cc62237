//! Saga state machines.
//!
//! State is an explicit value threaded from step to step; it is never shared
//! or aliased between runs. The reached state is the compensation anchor:
//! the table maps it to the exact list of inverse commands.

use serde::{Deserialize, Serialize};

/// States of the single-account (expense/income) sagas.
///
/// Happy paths:
/// ```text
/// create: Init ──► RecordCreated ──► BalanceAdjusted
/// update: Init ──► [BalanceAdjusted if delta ≠ 0] ──► RecordUpdated
/// delete: Init ──► RecordDeleted (confirmed) ──► BalanceAdjusted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RecordSagaState {
    /// No step has taken effect.
    #[default]
    Init,

    /// The record exists at the owning service.
    RecordCreated,

    /// The account balance reflects the operation.
    BalanceAdjusted,

    /// The record update has been applied.
    RecordUpdated,

    /// The delete has been confirmed by the existence probe.
    RecordDeleted,
}

impl RecordSagaState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSagaState::Init => "Init",
            RecordSagaState::RecordCreated => "RecordCreated",
            RecordSagaState::BalanceAdjusted => "BalanceAdjusted",
            RecordSagaState::RecordUpdated => "RecordUpdated",
            RecordSagaState::RecordDeleted => "RecordDeleted",
        }
    }
}

impl std::fmt::Display for RecordSagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// States of the two-account transfer sagas.
///
/// Happy paths:
/// ```text
/// create: Init ──► RecordCreated ──► FromWithdrawn ──► ToDeposited
/// update: Init ──► [FromAccountUpdated ──► ToAccountUpdated if delta ≠ 0] ──► RecordUpdated
/// delete: Init ──► RecordDeleted (confirmed) ──► ToWithdrawn ──► FromDeposited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransferSagaState {
    /// No step has taken effect.
    #[default]
    Init,

    /// The transfer record exists at the owning service.
    RecordCreated,

    /// The source account has been debited.
    FromWithdrawn,

    /// The target account has been credited.
    ToDeposited,

    /// The source account reflects the amount delta.
    FromAccountUpdated,

    /// The target account reflects the amount delta.
    ToAccountUpdated,

    /// The transfer record update has been applied.
    RecordUpdated,

    /// The delete has been confirmed by the existence probe.
    RecordDeleted,

    /// The target account has been debited back.
    ToWithdrawn,

    /// The source account has been credited back.
    FromDeposited,
}

impl TransferSagaState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferSagaState::Init => "Init",
            TransferSagaState::RecordCreated => "RecordCreated",
            TransferSagaState::FromWithdrawn => "FromWithdrawn",
            TransferSagaState::ToDeposited => "ToDeposited",
            TransferSagaState::FromAccountUpdated => "FromAccountUpdated",
            TransferSagaState::ToAccountUpdated => "ToAccountUpdated",
            TransferSagaState::RecordUpdated => "RecordUpdated",
            TransferSagaState::RecordDeleted => "RecordDeleted",
            TransferSagaState::ToWithdrawn => "ToWithdrawn",
            TransferSagaState::FromDeposited => "FromDeposited",
        }
    }
}

impl std::fmt::Display for TransferSagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
