//! Account model and balance rules.
//!
//! Maintains the invariant: `balance >= 0` after every committed operation,
//! which the unsigned balance type enforces structurally. Closing is one-way
//! and a closed account accepts no further balance mutation.

use crate::error::{LedgerError, Result};
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Internal row identifier of an account, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public, ten digit account number.
///
/// # Examples
///
/// ```
/// use account_ledger::AccountNumber;
///
/// let number: AccountNumber = "1000000000".parse().unwrap();
/// assert_eq!(number.next().unwrap().to_string(), "1000000001");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountNumber(u64);

impl AccountNumber {
    /// Number of digits in every account number.
    pub const WIDTH: usize = 10;

    /// Number issued when no account has ever been issued.
    pub const SEED: AccountNumber = AccountNumber(1_000_000_000);

    const MAX: u64 = 9_999_999_999;

    pub fn new(value: u64) -> Option<Self> {
        (value <= Self::MAX).then_some(AccountNumber(value))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// The number issued after this one, or `None` when the space is exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).and_then(Self::new)
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = Self::WIDTH)
    }
}

/// Rejected account number text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("account number must be exactly ten digits, got {input:?}")]
pub struct ParseAccountNumberError {
    pub input: String,
}

impl FromStr for AccountNumber {
    type Err = ParseAccountNumberError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let well_formed =
            trimmed.len() == Self::WIDTH && trimmed.bytes().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(ParseAccountNumberError {
                input: s.to_string(),
            });
        }
        trimmed
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ParseAccountNumberError {
                input: s.to_string(),
            })
    }
}

impl Serialize for AccountNumber {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("ACTIVE"),
            AccountStatus::Closed => f.write_str("CLOSED"),
        }
    }
}

/// Account to be inserted; the store assigns id and version.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: UserId,
    pub number: AccountNumber,
    pub balance: u64,
    pub registered_at: DateTime<Utc>,
}

/// A stored account.
///
/// # Invariants
///
/// - `number` never changes once assigned
/// - `status` only moves from `Active` to `Closed`
/// - `unregistered_at` is set exactly when `status == Closed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub number: AccountNumber,
    pub status: AccountStatus,

    /// Balance in minor currency units.
    pub balance: u64,

    pub registered_at: DateTime<Utc>,
    pub unregistered_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency version, bumped by the store on every save.
    pub version: u64,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Fails with `UserAccountMismatch` unless `user` owns this account.
    pub fn ensure_owned_by(&self, user: UserId) -> Result<()> {
        if self.user_id != user {
            return Err(LedgerError::UserAccountMismatch {
                user,
                account: self.number,
            });
        }
        Ok(())
    }

    /// Debits `amount`. Leaves the account untouched on failure.
    pub fn use_balance(&mut self, amount: u64) -> Result<()> {
        if !self.is_active() {
            return Err(LedgerError::AccountNotActive(self.number));
        }
        if amount > self.balance {
            return Err(LedgerError::AmountExceedsBalance {
                amount,
                balance: self.balance,
            });
        }

        self.balance -= amount;
        Ok(())
    }

    /// Credits back a previously used `amount`. Leaves the account untouched on failure.
    pub fn cancel_balance(&mut self, amount: u64) -> Result<()> {
        if !self.is_active() {
            return Err(LedgerError::AccountNotActive(self.number));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount {
                amount,
                reason: "refund would overflow the balance",
            })?;
        Ok(())
    }

    /// Closes the account at `now`.
    ///
    /// Fails if the account is already closed or still holds a balance.
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_active() {
            return Err(LedgerError::AccountAlreadyClosed(self.number));
        }
        if self.balance != 0 {
            return Err(LedgerError::BalanceNotEmpty {
                account: self.number,
                balance: self.balance,
            });
        }

        self.status = AccountStatus::Closed;
        self.unregistered_at = Some(now);
        Ok(())
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary::from(self)
    }
}

/// What callers see of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub user_id: UserId,
    pub account_number: AccountNumber,
    pub status: AccountStatus,
    pub balance: u64,
    pub registered_at: DateTime<Utc>,
    pub unregistered_at: Option<DateTime<Utc>>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        AccountSummary {
            user_id: account.user_id,
            account_number: account.number,
            status: account.status,
            balance: account.balance,
            registered_at: account.registered_at,
            unregistered_at: account.unregistered_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn account(balance: u64) -> Account {
        Account {
            id: AccountId(1),
            user_id: UserId(1),
            number: AccountNumber::SEED,
            status: AccountStatus::Active,
            balance,
            registered_at: Utc::now(),
            unregistered_at: None,
            version: 1,
        }
    }

    #[test]
    fn test_account_number_formatting_and_parsing() {
        assert_eq!(AccountNumber::SEED.to_string(), "1000000000");
        assert_eq!(AccountNumber::new(42).unwrap().to_string(), "0000000042");
        assert_eq!(
            "0000000042".parse::<AccountNumber>().unwrap(),
            AccountNumber::new(42).unwrap()
        );
        assert!("100000000".parse::<AccountNumber>().is_err());
        assert!("10000000000".parse::<AccountNumber>().is_err());
        assert!("10000x0000".parse::<AccountNumber>().is_err());
        assert!(AccountNumber::new(9_999_999_999).unwrap().next().is_none());
    }

    #[test]
    fn test_use_balance_decrements() {
        let mut account = account(10_000);
        account.use_balance(3_000).unwrap();
        assert_eq!(account.balance, 7_000);
    }

    #[test]
    fn test_use_balance_exact_balance_reaches_zero() {
        let mut account = account(100);
        account.use_balance(100).unwrap();
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_use_balance_rejects_overdraw() {
        let mut account = account(7_000);
        let err = account.use_balance(8_000).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AmountExceedsBalance));
        assert_eq!(account.balance, 7_000);
    }

    #[test]
    fn test_cancel_balance_overflow_is_rejected() {
        let mut account = account(u64::MAX);
        let err = account.cancel_balance(1).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidAmount));
        assert_eq!(account.balance, u64::MAX);
    }

    #[test]
    fn test_close_requires_empty_balance() {
        let mut account = account(100);
        let err = account.close(Utc::now()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BalanceNotEmpty));
        assert!(account.is_active());

        account.use_balance(100).unwrap();
        account.close(Utc::now()).unwrap();
        assert_eq!(account.status, AccountStatus::Closed);
        assert!(account.unregistered_at.is_some());
    }

    #[test]
    fn test_closed_account_rejects_all_mutations() {
        let mut account = account(0);
        account.close(Utc::now()).unwrap();

        assert_eq!(
            account.use_balance(0).unwrap_err().code(),
            Some(ErrorCode::AccountNotActive)
        );
        assert_eq!(
            account.cancel_balance(10).unwrap_err().code(),
            Some(ErrorCode::AccountNotActive)
        );
        assert_eq!(
            account.close(Utc::now()).unwrap_err().code(),
            Some(ErrorCode::AccountAlreadyClosed)
        );
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_ownership_check() {
        let account = account(0);
        assert!(account.ensure_owned_by(UserId(1)).is_ok());
        assert_eq!(
            account.ensure_owned_by(UserId(2)).unwrap_err().code(),
            Some(ErrorCode::UserAccountMismatch)
        );
    }
}
