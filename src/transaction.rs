//! Ledger entry models and the result values handed back to callers.

use crate::account::{AccountId, AccountNumber};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Opaque, globally unique transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// A fresh random identifier (32 lowercase hex characters).
    pub fn generate() -> Self {
        TransactionId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        TransactionId(value)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        TransactionId(value.to_string())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of balance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Debit of the account balance.
    Use,

    /// Reversal of a prior successful use.
    Cancel,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Use => f.write_str("USE"),
            TransactionType::Cancel => f.write_str("CANCEL"),
        }
    }
}

/// Outcome recorded for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionResult {
    Success,
    Fail,
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionResult::Success => f.write_str("SUCCESS"),
            TransactionResult::Fail => f.write_str("FAIL"),
        }
    }
}

/// Ledger entry about to be appended; the ledger assigns its row id.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub account_number: AccountNumber,
    pub kind: TransactionType,
    pub result: TransactionResult,
    pub amount: u64,

    /// Balance after the mutation for a success, before it for a failure.
    pub balance_snapshot: u64,

    pub transacted_at: DateTime<Utc>,

    /// For CANCEL entries, the USE transaction being reversed.
    pub cancels: Option<TransactionId>,
}

impl NewTransaction {
    /// A new entry with a freshly generated transaction id.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        account_id: AccountId,
        account_number: AccountNumber,
        kind: TransactionType,
        result: TransactionResult,
        amount: u64,
        balance_snapshot: u64,
        transacted_at: DateTime<Utc>,
        cancels: Option<TransactionId>,
    ) -> Self {
        NewTransaction {
            transaction_id: TransactionId::generate(),
            account_id,
            account_number,
            kind,
            result,
            amount,
            balance_snapshot,
            transacted_at,
            cancels,
        }
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: u64,
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub account_number: AccountNumber,
    pub kind: TransactionType,
    pub result: TransactionResult,
    pub amount: u64,
    pub balance_snapshot: u64,
    pub transacted_at: DateTime<Utc>,
    pub cancels: Option<TransactionId>,
}

impl Transaction {
    pub fn is_successful_use(&self) -> bool {
        self.kind == TransactionType::Use && self.result == TransactionResult::Success
    }

    pub fn outcome(&self) -> TransactionOutcome {
        TransactionOutcome {
            account_number: self.account_number,
            result: self.result,
            transaction_id: self.transaction_id.clone(),
            amount: self.amount,
            transacted_at: self.transacted_at,
        }
    }

    pub fn detail(&self) -> TransactionDetail {
        TransactionDetail {
            account_number: self.account_number,
            kind: self.kind,
            result: self.result,
            transaction_id: self.transaction_id.clone(),
            amount: self.amount,
            balance_snapshot: self.balance_snapshot,
            transacted_at: self.transacted_at,
        }
    }
}

/// Returned by a successful use or cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    pub account_number: AccountNumber,
    pub result: TransactionResult,
    pub transaction_id: TransactionId,
    pub amount: u64,
    pub transacted_at: DateTime<Utc>,
}

/// Read-only view of a ledger entry for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDetail {
    pub account_number: AccountNumber,
    pub kind: TransactionType,
    pub result: TransactionResult,
    pub transaction_id: TransactionId,
    pub amount: u64,
    pub balance_snapshot: u64,
    pub transacted_at: DateTime<Utc>,
}
