//! Compensation tables.
//!
//! Pure mappings from (operation, reached state, run context) to the ordered
//! list of inverse commands, applied in reverse dependency order: the most
//! recently applied effect is undone first. `Init` always maps to the empty
//! list. States a given operation cannot reach also map to the empty list.
//!
//! Inverse balance adjustments are obtained by negating the signed delta the
//! forward step applied, so a negative applied delta is undone by the
//! opposite-signed adjustment of the same magnitude.

use common::{AccountId, Money};
use domain::FinancialRecord;
use transport::CommandEnvelope;

use crate::commands;
use crate::state::{RecordSagaState, TransferSagaState};

/// Inverse commands for a failed single-account create.
pub fn create_compensations(
    record: &FinancialRecord,
    reached: RecordSagaState,
) -> Vec<CommandEnvelope> {
    match reached {
        RecordSagaState::RecordCreated => vec![commands::delete_record(record.id)],
        RecordSagaState::BalanceAdjusted => {
            let mut inverses: Vec<_> =
                commands::adjustment(record.account_id, -record.balance_effect())
                    .into_iter()
                    .collect();
            inverses.push(commands::delete_record(record.id));
            inverses
        }
        _ => Vec::new(),
    }
}

/// Inverse commands for a failed single-account update.
///
/// `applied_delta` is the signed balance change the adjustment step applied;
/// zero when the step was skipped or never reached.
pub fn update_compensations(
    original: &FinancialRecord,
    applied_delta: Money,
    reached: RecordSagaState,
) -> Vec<CommandEnvelope> {
    match reached {
        RecordSagaState::BalanceAdjusted => {
            commands::adjustment(original.account_id, -applied_delta)
                .into_iter()
                .collect()
        }
        RecordSagaState::RecordUpdated => {
            let mut inverses = vec![commands::update_record(original)];
            inverses.extend(commands::adjustment(original.account_id, -applied_delta));
            inverses
        }
        _ => Vec::new(),
    }
}

/// Inverse commands for a failed single-account delete.
pub fn delete_compensations(
    record: &FinancialRecord,
    reached: RecordSagaState,
) -> Vec<CommandEnvelope> {
    match reached {
        RecordSagaState::RecordDeleted => vec![commands::create_record(record)],
        RecordSagaState::BalanceAdjusted => {
            // The delete path reversed the record's effect; undo re-applies it.
            let mut inverses: Vec<_> =
                commands::adjustment(record.account_id, record.balance_effect())
                    .into_iter()
                    .collect();
            inverses.push(commands::create_record(record));
            inverses
        }
        _ => Vec::new(),
    }
}

/// Inverse commands for a failed transfer create.
pub fn create_transfer_compensations(
    record: &FinancialRecord,
    to_account: AccountId,
    reached: TransferSagaState,
) -> Vec<CommandEnvelope> {
    match reached {
        TransferSagaState::RecordCreated => vec![commands::delete_record(record.id)],
        TransferSagaState::FromWithdrawn => vec![
            commands::deposit(record.account_id, record.amount),
            commands::delete_record(record.id),
        ],
        TransferSagaState::ToDeposited => vec![
            commands::withdraw(to_account, record.amount),
            commands::deposit(record.account_id, record.amount),
            commands::delete_record(record.id),
        ],
        _ => Vec::new(),
    }
}

/// Inverse commands for a failed transfer update.
///
/// `applied_from_delta` and `applied_to_delta` are the signed balance changes
/// already applied to the source and target accounts; zero when the
/// corresponding step was skipped or never reached.
pub fn update_transfer_compensations(
    original: &FinancialRecord,
    to_account: AccountId,
    applied_from_delta: Money,
    applied_to_delta: Money,
    reached: TransferSagaState,
) -> Vec<CommandEnvelope> {
    match reached {
        TransferSagaState::FromAccountUpdated => {
            commands::adjustment(original.account_id, -applied_from_delta)
                .into_iter()
                .collect()
        }
        TransferSagaState::ToAccountUpdated => {
            let mut inverses: Vec<_> = commands::adjustment(to_account, -applied_to_delta)
                .into_iter()
                .collect();
            inverses.extend(commands::adjustment(
                original.account_id,
                -applied_from_delta,
            ));
            inverses
        }
        TransferSagaState::RecordUpdated => {
            let mut inverses = vec![commands::update_record(original)];
            inverses.extend(commands::adjustment(to_account, -applied_to_delta));
            inverses.extend(commands::adjustment(
                original.account_id,
                -applied_from_delta,
            ));
            inverses
        }
        _ => Vec::new(),
    }
}

/// Inverse commands for a failed transfer delete.
pub fn delete_transfer_compensations(
    record: &FinancialRecord,
    to_account: AccountId,
    reached: TransferSagaState,
) -> Vec<CommandEnvelope> {
    match reached {
        TransferSagaState::RecordDeleted => vec![commands::create_record(record)],
        TransferSagaState::ToWithdrawn => vec![
            commands::deposit(to_account, record.amount),
            commands::create_record(record),
        ],
        TransferSagaState::FromDeposited => vec![
            commands::withdraw(record.account_id, record.amount),
            commands::deposit(to_account, record.amount),
            commands::create_record(record),
        ],
        _ => Vec::new(),
    }
}
