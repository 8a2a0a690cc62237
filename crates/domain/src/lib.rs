//! Financial record model shared by the saga coordinators and the transport
//! layer.
//!
//! A record is a flat base struct plus an optional transfer extension;
//! command payloads are a tagged union matched exhaustively at dispatch
//! boundaries.

pub mod error;
pub mod payload;
pub mod record;

pub use error::RecordError;
pub use payload::{BalanceChange, CommandPayload, RecordRef};
pub use record::{EntryKind, FinancialRecord, TransferDetails};
