//! Account storage.
//!
//! The store owns account rows. Saves are compare-and-swap on
//! [`Account::version`] and account numbers are issued atomically.

use crate::account::{Account, AccountId, AccountNumber, AccountStatus, NewAccount};
use crate::error::StoreError;
use crate::user::UserId;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persistence port for accounts.
pub trait AccountStore: Send + Sync {
    fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    fn find_by_account_number(&self, number: AccountNumber)
        -> Result<Option<Account>, StoreError>;

    /// Highest number handed out so far, whether or not its account was inserted.
    fn find_highest_issued_account_number(&self) -> Result<Option<AccountNumber>, StoreError>;

    /// Atomically reserves the next account number: highest issued + 1, or
    /// `seed` when nothing has been issued yet.
    fn issue_account_number(&self, seed: AccountNumber) -> Result<AccountNumber, StoreError>;

    fn count_active_accounts_for_user(&self, user: UserId) -> Result<usize, StoreError>;

    /// Every account of `user`, in insertion order.
    fn find_all_for_user(&self, user: UserId) -> Result<Vec<Account>, StoreError>;

    /// Inserts a new ACTIVE account and returns it with id and version assigned.
    fn insert(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Replaces the stored row if its version still equals `account.version`.
    ///
    /// Returns the saved row with its version bumped.
    fn save(&self, account: &Account) -> Result<Account, StoreError>;
}

#[derive(Debug, Default)]
struct Rows {
    /// Row `i` holds account id `i + 1`.
    accounts: Vec<Account>,
    by_number: HashMap<AccountNumber, usize>,
    last_issued: Option<AccountNumber>,
}

/// In-memory account store.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    rows: RwLock<Rows>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every account in insertion order.
    pub fn all(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.read()?.accounts.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Rows>, StoreError> {
        self.rows
            .read()
            .map_err(|_| StoreError::Unavailable("account store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Rows>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Unavailable("account store lock poisoned".to_string()))
    }
}

impl AccountStore for InMemoryAccountStore {
    fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let rows = self.read()?;
        let index = match (id.0 as usize).checked_sub(1) {
            Some(index) => index,
            None => return Ok(None),
        };
        Ok(rows.accounts.get(index).cloned())
    }

    fn find_by_account_number(
        &self,
        number: AccountNumber,
    ) -> Result<Option<Account>, StoreError> {
        let rows = self.read()?;
        Ok(rows
            .by_number
            .get(&number)
            .and_then(|&index| rows.accounts.get(index))
            .cloned())
    }

    fn find_highest_issued_account_number(&self) -> Result<Option<AccountNumber>, StoreError> {
        Ok(self.read()?.last_issued)
    }

    fn issue_account_number(&self, seed: AccountNumber) -> Result<AccountNumber, StoreError> {
        let mut rows = self.write()?;
        let issued = match rows.last_issued {
            Some(last) => last.next().ok_or(StoreError::NumbersExhausted)?,
            None => seed,
        };
        rows.last_issued = Some(issued);
        Ok(issued)
    }

    fn count_active_accounts_for_user(&self, user: UserId) -> Result<usize, StoreError> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .filter(|a| a.user_id == user && a.status == AccountStatus::Active)
            .count())
    }

    fn find_all_for_user(&self, user: UserId) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect())
    }

    fn insert(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut rows = self.write()?;
        if rows.by_number.contains_key(&account.number) {
            return Err(StoreError::DuplicateAccountNumber(account.number));
        }

        let index = rows.accounts.len();
        let stored = Account {
            id: AccountId(index as u64 + 1),
            user_id: account.user_id,
            number: account.number,
            status: AccountStatus::Active,
            balance: account.balance,
            registered_at: account.registered_at,
            unregistered_at: None,
            version: 1,
        };
        rows.accounts.push(stored.clone());
        rows.by_number.insert(stored.number, index);
        if rows.last_issued.map_or(true, |last| last < stored.number) {
            rows.last_issued = Some(stored.number);
        }
        Ok(stored)
    }

    fn save(&self, account: &Account) -> Result<Account, StoreError> {
        let mut rows = self.write()?;
        let index = (account.id.0 as usize)
            .checked_sub(1)
            .filter(|&index| index < rows.accounts.len())
            .ok_or(StoreError::UnknownAccount(account.id.0))?;

        let current = &mut rows.accounts[index];
        if current.version != account.version {
            return Err(StoreError::VersionConflict {
                account: current.number,
                expected: account.version,
                actual: current.version,
            });
        }

        let mut saved = account.clone();
        saved.number = current.number;
        saved.version += 1;
        *current = saved.clone();
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_account(user: u64, number: AccountNumber) -> NewAccount {
        NewAccount {
            user_id: UserId(user),
            number,
            balance: 500,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_starts_at_seed_and_increments() {
        let store = InMemoryAccountStore::new();
        assert_eq!(store.find_highest_issued_account_number().unwrap(), None);

        let first = store.issue_account_number(AccountNumber::SEED).unwrap();
        let second = store.issue_account_number(AccountNumber::SEED).unwrap();
        assert_eq!(first.to_string(), "1000000000");
        assert_eq!(second.to_string(), "1000000001");
        assert_eq!(
            store.find_highest_issued_account_number().unwrap(),
            Some(second)
        );
    }

    #[test]
    fn test_issue_fails_when_exhausted() {
        let store = InMemoryAccountStore::new();
        let last = AccountNumber::new(9_999_999_999).unwrap();
        store.issue_account_number(last).unwrap();
        assert_eq!(
            store.issue_account_number(last),
            Err(StoreError::NumbersExhausted)
        );
    }

    #[test]
    fn test_insert_assigns_ids_in_order() {
        let store = InMemoryAccountStore::new();
        let a = store.insert(new_account(1, AccountNumber::SEED)).unwrap();
        let b = store
            .insert(new_account(1, AccountNumber::SEED.next().unwrap()))
            .unwrap();

        assert_eq!(a.id, AccountId(1));
        assert_eq!(b.id, AccountId(2));
        assert_eq!(store.find_by_id(AccountId(2)).unwrap().unwrap(), b);
        assert_eq!(store.find_by_id(AccountId(0)).unwrap(), None);
        assert_eq!(
            store.find_by_account_number(a.number).unwrap().unwrap(),
            a
        );

        let all = store.find_all_for_user(UserId(1)).unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[test]
    fn test_insert_rejects_duplicate_number() {
        let store = InMemoryAccountStore::new();
        store.insert(new_account(1, AccountNumber::SEED)).unwrap();
        assert_eq!(
            store.insert(new_account(2, AccountNumber::SEED)).unwrap_err(),
            StoreError::DuplicateAccountNumber(AccountNumber::SEED)
        );
    }

    #[test]
    fn test_save_is_compare_and_swap() {
        let store = InMemoryAccountStore::new();
        let stored = store.insert(new_account(1, AccountNumber::SEED)).unwrap();

        let mut first = stored.clone();
        first.balance = 100;
        let saved = store.save(&first).unwrap();
        assert_eq!(saved.version, stored.version + 1);

        let mut stale = stored.clone();
        stale.balance = 0;
        let err = store.save(&stale).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
        assert_eq!(
            store.find_by_id(stored.id).unwrap().unwrap().balance,
            100
        );
    }

    #[test]
    fn test_count_ignores_closed_accounts() {
        let store = InMemoryAccountStore::new();
        let stored = store.insert(new_account(1, AccountNumber::SEED)).unwrap();
        store
            .insert(new_account(1, AccountNumber::SEED.next().unwrap()))
            .unwrap();
        assert_eq!(store.count_active_accounts_for_user(UserId(1)).unwrap(), 2);

        let mut closed = stored;
        closed.status = AccountStatus::Closed;
        store.save(&closed).unwrap();
        assert_eq!(store.count_active_accounts_for_user(UserId(1)).unwrap(), 1);
        assert_eq!(store.count_active_accounts_for_user(UserId(2)).unwrap(), 0);
    }
}
