//! Balance-affecting operations and their ledger trail.
//!
//! Each use or cancel runs under the account's lock and commits the account
//! with a compare-and-swap save. The ledger entry is appended only after the
//! account save succeeded; if the append fails the account is restored and
//! the attempt is recorded as FAIL. If even the restore fails the caller gets
//! `UnreconciledCommit` naming the row that still carries the mutation.
//! Rejected attempts leave the account untouched and append a FAIL entry
//! carrying the pre-mutation balance.

use crate::account::{Account, AccountNumber};
use crate::account_service::AccountService;
use crate::error::{LedgerError, Result, StoreError};
use crate::ledger::TransactionLedger;
use crate::transaction::{
    NewTransaction, Transaction, TransactionDetail, TransactionId, TransactionOutcome,
    TransactionResult, TransactionType,
};
use crate::user::UserId;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Applies use / cancel operations to accounts and records them in the ledger.
pub struct TransactionService {
    accounts: Arc<AccountService>,
    ledger: Arc<dyn TransactionLedger>,
}

impl TransactionService {
    pub fn new(accounts: Arc<AccountService>, ledger: Arc<dyn TransactionLedger>) -> Self {
        TransactionService { accounts, ledger }
    }

    /// Debits `amount` from an ACTIVE account owned by `user_id`.
    pub fn use_balance(
        &self,
        user_id: UserId,
        number: AccountNumber,
        amount: u64,
    ) -> Result<TransactionOutcome> {
        ensure_positive(amount)?;
        let user = self.accounts.resolve_user(user_id)?;
        let _guard = self.accounts.lock_account(number);

        self.commit(number, TransactionType::Use, amount, None, |account, _| {
            account.ensure_owned_by(user.id)?;
            account.use_balance(amount)
        })
    }

    /// Reverses the successful use `transaction_id` on account `number`.
    ///
    /// The amount must match the original exactly and a transaction can be
    /// reversed at most once.
    pub fn cancel_balance(
        &self,
        transaction_id: &TransactionId,
        number: AccountNumber,
        amount: u64,
    ) -> Result<TransactionOutcome> {
        ensure_positive(amount)?;
        let original = self
            .ledger
            .find_by_transaction_id(transaction_id)?
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.clone()))?;
        let _guard = self.accounts.lock_account(number);

        self.commit(
            number,
            TransactionType::Cancel,
            amount,
            Some(original.transaction_id.clone()),
            |account, now| {
                self.validate_cancel(&original, account, amount, now)?;
                account.cancel_balance(amount)
            },
        )
    }

    pub fn get_transaction(&self, transaction_id: &TransactionId) -> Result<TransactionDetail> {
        self.ledger
            .find_by_transaction_id(transaction_id)?
            .map(|tx| tx.detail())
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.clone()))
    }

    /// Ledger entries of one account, oldest first.
    pub fn list_transactions(&self, number: AccountNumber) -> Result<Vec<TransactionDetail>> {
        let account = self.accounts.resolve_account(number)?;
        Ok(self
            .ledger
            .find_all_for_account(account.id)?
            .iter()
            .map(Transaction::detail)
            .collect())
    }

    fn validate_cancel(
        &self,
        original: &Transaction,
        account: &Account,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !original.is_successful_use() {
            return Err(LedgerError::TransactionNotCancellable(
                original.transaction_id.clone(),
            ));
        }
        if original.account_id != account.id {
            return Err(LedgerError::AccountTransactionMismatch {
                transaction: original.transaction_id.clone(),
                account: account.number,
            });
        }
        if original.amount != amount {
            return Err(LedgerError::AmountMismatch {
                original: original.amount,
                requested: amount,
            });
        }
        let window = self.accounts.config().cancellation_window;
        if now.signed_duration_since(original.transacted_at) > window {
            return Err(LedgerError::TransactionTooOld(original.transaction_id.clone()));
        }
        if let Some(cancel) = self.ledger.find_cancellation_of(&original.transaction_id)? {
            debug!(
                "Transaction {} was already cancelled by {}",
                original.transaction_id, cancel.transaction_id
            );
            return Err(LedgerError::TransactionAlreadyCancelled(
                original.transaction_id.clone(),
            ));
        }
        Ok(())
    }

    /// Read, validate, mutate, save and record, retrying on version conflicts.
    fn commit<F>(
        &self,
        number: AccountNumber,
        kind: TransactionType,
        amount: u64,
        cancels: Option<TransactionId>,
        apply: F,
    ) -> Result<TransactionOutcome>
    where
        F: Fn(&mut Account, DateTime<Utc>) -> Result<()>,
    {
        let attempts = self.accounts.config().max_commit_attempts.max(1);
        let mut last_seen = None;

        for attempt in 1..=attempts {
            let account = self.accounts.resolve_account(number)?;
            let now = self.accounts.clock().now();

            let mut updated = account.clone();
            if let Err(e) = apply(&mut updated, now) {
                warn!("{} of {} on account {} rejected: {}", kind, amount, number, e);
                self.record_failure(&account, kind, amount, now, cancels.clone())?;
                return Err(e);
            }

            match self.accounts.store().save(&updated) {
                Ok(saved) => {
                    return self.record_success(
                        &account,
                        &saved,
                        kind,
                        amount,
                        now,
                        cancels.clone(),
                    );
                }
                Err(StoreError::VersionConflict {
                    expected, actual, ..
                }) => {
                    warn!(
                        "Account {} changed underneath {} (version {} -> {}), attempt {}/{}",
                        number, kind, expected, actual, attempt, attempts
                    );
                    last_seen = Some(account);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(account) = last_seen {
            let now = self.accounts.clock().now();
            self.record_failure(&account, kind, amount, now, cancels)?;
        }
        Err(LedgerError::TransientConflict {
            account: number,
            attempts,
        })
    }

    fn record_success(
        &self,
        before: &Account,
        saved: &Account,
        kind: TransactionType,
        amount: u64,
        now: DateTime<Utc>,
        cancels: Option<TransactionId>,
    ) -> Result<TransactionOutcome> {
        let entry = NewTransaction::record(
            saved.id,
            saved.number,
            kind,
            TransactionResult::Success,
            amount,
            saved.balance,
            now,
            cancels.clone(),
        );

        let append = match self.ledger.save(entry) {
            Ok(tx) => {
                info!(
                    "{} {} on account {} -> balance {} ({})",
                    kind, amount, saved.number, saved.balance, tx.transaction_id
                );
                return Ok(tx.outcome());
            }
            Err(e) => e,
        };

        if let Err(cause) = self.restore(before, saved) {
            error!(
                "Account {} left at balance {} with no ledger entry (append: {}, restore: {})",
                saved.number, saved.balance, append, cause
            );
            return Err(LedgerError::UnreconciledCommit {
                account: saved.number,
                balance: saved.balance,
                cause,
            });
        }
        if let Err(e) = self.record_failure(before, kind, amount, now, cancels) {
            warn!("Could not record failed {} on account {}: {}", kind, saved.number, e);
        }
        Err(append.into())
    }

    fn record_failure(
        &self,
        account: &Account,
        kind: TransactionType,
        amount: u64,
        now: DateTime<Utc>,
        cancels: Option<TransactionId>,
    ) -> Result<()> {
        let entry = NewTransaction::record(
            account.id,
            account.number,
            kind,
            TransactionResult::Fail,
            amount,
            account.balance,
            now,
            cancels,
        );
        let tx = self.ledger.save(entry)?;
        debug!("Recorded failed {} as {}", kind, tx.transaction_id);
        Ok(())
    }

    /// Puts the pre-mutation balance back after the ledger refused the entry.
    fn restore(&self, before: &Account, saved: &Account) -> std::result::Result<(), StoreError> {
        let mut rollback = before.clone();
        rollback.version = saved.version;
        self.accounts.store().save(&rollback)?;
        debug!("Restored account {} to balance {}", before.number, before.balance);
        Ok(())
    }
}

fn ensure_positive(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount {
            amount,
            reason: "amount must be at least one minor unit",
        });
    }
    Ok(())
}
