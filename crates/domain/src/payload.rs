//! Command payload union.
//!
//! One tagged enum covers every payload a command can carry, so dispatch
//! sites match exhaustively instead of downcasting at runtime.

use common::{AccountId, Money, RecordId};
use serde::{Deserialize, Serialize};

use crate::record::FinancialRecord;

/// Payload carried by an outbound command envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CommandPayload {
    /// Full record, carried by CREATE and UPDATE commands.
    Record(FinancialRecord),

    /// Reference to an existing record, carried by DELETE commands.
    RecordRef(RecordRef),

    /// Balance adjustment, carried by DEPOSIT and WITHDRAW commands.
    Balance(BalanceChange),
}

/// Reference to a record by ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    /// The record being referenced.
    pub record_id: RecordId,
}

/// A balance adjustment against one account.
///
/// The amount is a positive magnitude; the command kind (deposit/withdraw)
/// carries the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// The account whose balance changes.
    pub account_id: AccountId,

    /// Positive magnitude of the change.
    pub amount: Money,
}
