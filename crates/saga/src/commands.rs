//! Command envelope constructors.
//!
//! All outbound commands the coordinators and compensation tables produce
//! are built here, so subject keys and payload shapes cannot drift between
//! the forward path and the inverse path. Correlation IDs are stamped later,
//! by the step executor, and only on awaited commands.

use common::{AccountId, Money, RecordId};
use domain::{BalanceChange, CommandPayload, FinancialRecord, RecordRef};
use transport::{CommandEnvelope, CommandKind};

/// Builds a CREATE command carrying the full record.
pub fn create_record(record: &FinancialRecord) -> CommandEnvelope {
    CommandEnvelope::builder()
        .kind(CommandKind::Create)
        .subject_key(record.id.to_string())
        .payload(CommandPayload::Record(record.clone()))
        .build()
}

/// Builds an UPDATE command carrying the full record.
pub fn update_record(record: &FinancialRecord) -> CommandEnvelope {
    CommandEnvelope::builder()
        .kind(CommandKind::Update)
        .subject_key(record.id.to_string())
        .payload(CommandPayload::Record(record.clone()))
        .build()
}

/// Builds a DELETE command referencing the record by ID.
pub fn delete_record(record_id: RecordId) -> CommandEnvelope {
    CommandEnvelope::builder()
        .kind(CommandKind::Delete)
        .subject_key(record_id.to_string())
        .payload(CommandPayload::RecordRef(RecordRef { record_id }))
        .build()
}

/// Builds a DEPOSIT command crediting `account_id` by `amount`.
pub fn deposit(account_id: AccountId, amount: Money) -> CommandEnvelope {
    balance(CommandKind::Deposit, account_id, amount)
}

/// Builds a WITHDRAW command debiting `account_id` by `amount`.
pub fn withdraw(account_id: AccountId, amount: Money) -> CommandEnvelope {
    balance(CommandKind::Withdraw, account_id, amount)
}

/// Builds the balance adjustment that applies the signed `delta` to
/// `account_id`: a positive delta deposits, a negative delta withdraws the
/// same magnitude, and zero needs no command at all.
///
/// Compensation inverses are obtained by negating the delta, which is what
/// makes them sign-aware.
pub fn adjustment(account_id: AccountId, delta: Money) -> Option<CommandEnvelope> {
    if delta.is_zero() {
        return None;
    }
    let kind = if delta.is_positive() {
        CommandKind::Deposit
    } else {
        CommandKind::Withdraw
    };
    Some(balance(kind, account_id, delta.abs()))
}

fn balance(kind: CommandKind, account_id: AccountId, amount: Money) -> CommandEnvelope {
    CommandEnvelope::builder()
        .kind(kind)
        .subject_key(account_id.to_string())
        .payload(CommandPayload::Balance(BalanceChange { account_id, amount }))
        .build()
}
