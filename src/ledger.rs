//! Append-only transaction ledger.

use crate::account::AccountId;
use crate::error::StoreError;
use crate::transaction::{
    NewTransaction, Transaction, TransactionId, TransactionResult, TransactionType,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persistence port for ledger entries. Entries are never updated or removed.
pub trait TransactionLedger: Send + Sync {
    /// Appends an entry. Fails if its transaction id is already recorded.
    fn save(&self, entry: NewTransaction) -> Result<Transaction, StoreError>;

    fn find_by_transaction_id(&self, id: &TransactionId)
        -> Result<Option<Transaction>, StoreError>;

    /// The SUCCESS cancel that reversed `id`, if any.
    fn find_cancellation_of(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Entries of one account in append order.
    fn find_all_for_account(&self, account: AccountId) -> Result<Vec<Transaction>, StoreError>;
}

#[derive(Debug, Default)]
struct Entries {
    log: Vec<Transaction>,
    by_transaction_id: HashMap<TransactionId, usize>,
    cancelled_by: HashMap<TransactionId, usize>,
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: RwLock<Entries>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry in append order.
    pub fn all(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.read()?.log.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries>, StoreError> {
        self.entries
            .read()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>, StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))
    }
}

impl TransactionLedger for InMemoryLedger {
    fn save(&self, entry: NewTransaction) -> Result<Transaction, StoreError> {
        let mut entries = self.write()?;
        if entries.by_transaction_id.contains_key(&entry.transaction_id) {
            return Err(StoreError::DuplicateTransactionId(entry.transaction_id));
        }

        let index = entries.log.len();
        let stored = Transaction {
            id: index as u64 + 1,
            transaction_id: entry.transaction_id,
            account_id: entry.account_id,
            account_number: entry.account_number,
            kind: entry.kind,
            result: entry.result,
            amount: entry.amount,
            balance_snapshot: entry.balance_snapshot,
            transacted_at: entry.transacted_at,
            cancels: entry.cancels,
        };

        entries
            .by_transaction_id
            .insert(stored.transaction_id.clone(), index);
        if stored.kind == TransactionType::Cancel && stored.result == TransactionResult::Success {
            if let Some(original) = &stored.cancels {
                entries.cancelled_by.insert(original.clone(), index);
            }
        }
        entries.log.push(stored.clone());
        Ok(stored)
    }

    fn find_by_transaction_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let entries = self.read()?;
        Ok(entries
            .by_transaction_id
            .get(id)
            .and_then(|&index| entries.log.get(index))
            .cloned())
    }

    fn find_cancellation_of(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError> {
        let entries = self.read()?;
        Ok(entries
            .cancelled_by
            .get(id)
            .and_then(|&index| entries.log.get(index))
            .cloned())
    }

    fn find_all_for_account(&self, account: AccountId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .read()?
            .log
            .iter()
            .filter(|tx| tx.account_id == account)
            .cloned()
            .collect())
    }
}
