//! Account creation, closure and lookup.
//!
//! Every account handed to callers, including the transaction service,
//! passes through the resolution helpers here.

use crate::account::{Account, AccountNumber, AccountSummary, NewAccount};
use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::lock::{KeyGuard, KeyedLocks, LockKey};
use crate::store::AccountStore;
use crate::user::{User, UserDirectory, UserId};
use log::{debug, info, warn};
use std::sync::Arc;

/// Orchestrates account lifecycle over the user directory and account store.
pub struct AccountService {
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    locks: KeyedLocks<LockKey>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        AccountService {
            users,
            store,
            clock,
            config,
            locks: KeyedLocks::new(),
        }
    }

    /// Opens a new ACTIVE account for `user_id` holding `initial_balance`.
    pub fn create_account(&self, user_id: UserId, initial_balance: u64) -> Result<AccountSummary> {
        let user = self.resolve_user(user_id)?;
        let _guard = self.locks.lock(LockKey::User(user.id));

        let active = self.store.count_active_accounts_for_user(user.id)?;
        let limit = self.config.max_active_accounts_per_user;
        if active >= limit {
            warn!("User {} already owns {} active accounts", user.id, active);
            return Err(LedgerError::AccountLimitExceeded {
                user: user.id,
                limit,
            });
        }

        let number = self
            .store
            .issue_account_number(self.config.seed_account_number)?;
        let account = self.store.insert(NewAccount {
            user_id: user.id,
            number,
            balance: initial_balance,
            registered_at: self.clock.now(),
        })?;

        info!(
            "Opened account {} for user {} with balance {}",
            account.number, user.id, account.balance
        );
        Ok(account.summary())
    }

    /// Closes an empty account owned by `user_id`.
    pub fn close_account(&self, user_id: UserId, number: AccountNumber) -> Result<AccountSummary> {
        let user = self.resolve_user(user_id)?;
        let _guard = self.lock_account(number);

        let mut account = self.resolve_account(number)?;
        account.ensure_owned_by(user.id)?;
        if let Err(e) = account.close(self.clock.now()) {
            warn!("Refusing to close account {}: {}", number, e);
            return Err(e);
        }

        let saved = self.store.save(&account)?;
        info!("Closed account {} for user {}", saved.number, user.id);
        Ok(saved.summary())
    }

    /// Every account owned by `user_id`, in insertion order.
    pub fn list_accounts(&self, user_id: UserId) -> Result<Vec<AccountSummary>> {
        let user = self.resolve_user(user_id)?;
        let accounts = self.store.find_all_for_user(user.id)?;
        debug!("User {} owns {} accounts", user.id, accounts.len());
        Ok(accounts.iter().map(Account::summary).collect())
    }

    pub fn get_account(&self, number: AccountNumber) -> Result<AccountSummary> {
        Ok(self.resolve_account(number)?.summary())
    }

    pub(crate) fn resolve_user(&self, user_id: UserId) -> Result<User> {
        self.users
            .find_user(user_id)?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    pub(crate) fn resolve_account(&self, number: AccountNumber) -> Result<Account> {
        self.store
            .find_by_account_number(number)?
            .ok_or(LedgerError::AccountNotFound(number))
    }

    pub(crate) fn lock_account(&self, number: AccountNumber) -> KeyGuard {
        self.locks.lock(LockKey::Account(number))
    }

    pub(crate) fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::clock::ManualClock;
    use crate::error::ErrorCode;
    use crate::store::InMemoryAccountStore;
    use crate::user::{InMemoryUserDirectory, User};
    use chrono::{TimeZone, Utc};

    fn service_with(config: LedgerConfig) -> (AccountService, Arc<InMemoryAccountStore>) {
        let users = Arc::new(InMemoryUserDirectory::new());
        users.register(User::new(1, "Pobi")).unwrap();
        users.register(User::new(2, "Crong")).unwrap();
        let store = Arc::new(InMemoryAccountStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let service = AccountService::new(users, store.clone(), clock, config);
        (service, store)
    }

    fn service() -> AccountService {
        service_with(LedgerConfig::default()).0
    }

    #[test]
    fn test_create_account_numbers_from_seed() {
        let service = service();

        let first = service.create_account(UserId(1), 0).unwrap();
        assert_eq!(first.account_number.to_string(), "1000000000");
        assert_eq!(first.balance, 0);
        assert_eq!(first.status, AccountStatus::Active);
        assert_eq!(
            first.registered_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
        );

        let second = service.create_account(UserId(2), 500).unwrap();
        assert_eq!(second.account_number.to_string(), "1000000001");
        assert_eq!(second.user_id, UserId(2));
    }

    #[test]
    fn test_create_account_unknown_user() {
        let service = service();
        let err = service.create_account(UserId(99), 0).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UserNotFound));
    }

    #[test]
    fn test_create_account_respects_configured_limit() {
        let (service, _) = service_with(LedgerConfig::default().with_max_active_accounts(2));
        service.create_account(UserId(1), 0).unwrap();
        service.create_account(UserId(1), 0).unwrap();

        let err = service.create_account(UserId(1), 0).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AccountLimitExceeded));

        // Another user is unaffected.
        service.create_account(UserId(2), 0).unwrap();
    }

    #[test]
    fn test_close_account_checks() {
        let service = service();
        let funded = service.create_account(UserId(1), 100).unwrap();
        let empty = service.create_account(UserId(1), 0).unwrap();

        let err = service
            .close_account(UserId(2), empty.account_number)
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UserAccountMismatch));

        let err = service
            .close_account(UserId(1), funded.account_number)
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BalanceNotEmpty));

        let closed = service.close_account(UserId(1), empty.account_number).unwrap();
        assert_eq!(closed.status, AccountStatus::Closed);
        assert!(closed.unregistered_at.is_some());

        let err = service
            .close_account(UserId(1), empty.account_number)
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AccountAlreadyClosed));
    }

    #[test]
    fn test_close_account_unknown_account() {
        let service = service();
        let err = service
            .close_account(UserId(1), AccountNumber::SEED)
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AccountNotFound));

        let err = service
            .close_account(UserId(42), AccountNumber::SEED)
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UserNotFound));
    }

    #[test]
    fn test_list_accounts_in_insertion_order() {
        let service = service();
        let a = service.create_account(UserId(1), 0).unwrap();
        service.create_account(UserId(2), 0).unwrap();
        let c = service.create_account(UserId(1), 10).unwrap();

        let listed = service.list_accounts(UserId(1)).unwrap();
        assert_eq!(listed, vec![a, c]);
        assert!(service.list_accounts(UserId(2)).unwrap().len() == 1);
        assert_eq!(
            service.list_accounts(UserId(7)).unwrap_err().code(),
            Some(ErrorCode::UserNotFound)
        );
    }

    #[test]
    fn test_get_account() {
        let (service, store) = service_with(LedgerConfig::default());
        let created = service.create_account(UserId(1), 250).unwrap();

        assert_eq!(service.get_account(created.account_number).unwrap(), created);
        assert_eq!(store.all().unwrap().len(), 1);
    }
}
