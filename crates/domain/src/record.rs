//! Financial records: expenses, incomes, and inter-account transfers.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// The kind of a financial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Money leaving an account.
    Expense,

    /// Money entering an account.
    Income,

    /// Money moving between two accounts.
    Transfer,
}

impl EntryKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Expense => "Expense",
            EntryKind::Income => "Income",
            EntryKind::Transfer => "Transfer",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transfer-specific fields, attached to a base record by composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetails {
    /// The account receiving the transferred amount.
    pub to_account_id: AccountId,
}

/// A financial record owned by the record service.
///
/// `amount` is always a positive magnitude; the entry kind determines the
/// direction of the balance effect. For transfers, `account_id` is the
/// source account and `transfer.to_account_id` the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    /// Unique record identifier.
    pub id: RecordId,

    /// The kind of entry this record represents.
    pub kind: EntryKind,

    /// The account the record is booked against (source account for transfers).
    pub account_id: AccountId,

    /// Positive monetary magnitude of the record.
    pub amount: Money,

    /// Free-form description shown to the user.
    pub description: String,

    /// When the underlying financial event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Present only for transfers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferDetails>,
}

impl FinancialRecord {
    /// Creates a new expense record.
    pub fn expense(
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Self, RecordError> {
        Self::single(EntryKind::Expense, account_id, amount, description)
    }

    /// Creates a new income record.
    pub fn income(
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Self, RecordError> {
        Self::single(EntryKind::Income, account_id, amount, description)
    }

    fn single(
        kind: EntryKind,
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Self, RecordError> {
        if !amount.is_positive() {
            return Err(RecordError::NonPositiveAmount(amount.cents()));
        }
        Ok(Self {
            id: RecordId::new(),
            kind,
            account_id,
            amount,
            description: description.into(),
            occurred_at: Utc::now(),
            transfer: None,
        })
    }

    /// Creates a new transfer record moving `amount` from `from_account_id`
    /// to `to_account_id`.
    pub fn transfer(
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Self, RecordError> {
        if !amount.is_positive() {
            return Err(RecordError::NonPositiveAmount(amount.cents()));
        }
        if from_account_id == to_account_id {
            return Err(RecordError::SameAccountTransfer);
        }
        Ok(Self {
            id: RecordId::new(),
            kind: EntryKind::Transfer,
            account_id: from_account_id,
            amount,
            description: description.into(),
            occurred_at: Utc::now(),
            transfer: Some(TransferDetails { to_account_id }),
        })
    }

    /// Returns a copy of this record with a different amount.
    pub fn with_amount(&self, amount: Money) -> Result<Self, RecordError> {
        if !amount.is_positive() {
            return Err(RecordError::NonPositiveAmount(amount.cents()));
        }
        let mut record = self.clone();
        record.amount = amount;
        Ok(record)
    }

    /// Returns the target account of a transfer.
    pub fn to_account_id(&self) -> Result<AccountId, RecordError> {
        self.transfer
            .map(|t| t.to_account_id)
            .ok_or(RecordError::NotATransfer(self.id))
    }

    /// Signed effect of this record on the balance of `account_id`
    /// (the source account for transfers).
    ///
    /// Expenses and outgoing transfers debit, incomes credit. Every balance
    /// adjustment the sagas emit, including compensation inverses, is derived
    /// from this single sign convention.
    pub fn balance_effect(&self) -> Money {
        match self.kind {
            EntryKind::Expense | EntryKind::Transfer => -self.amount,
            EntryKind::Income => self.amount,
        }
    }

    /// Signed effect of this record on the target account of a transfer.
    pub fn target_balance_effect(&self) -> Result<Money, RecordError> {
        self.to_account_id()?;
        Ok(self.amount)
    }
}
