//! Property tests over random operation sequences.

use account_ledger::{
    AccountService, ErrorCode, InMemoryAccountStore, InMemoryLedger, InMemoryUserDirectory,
    LedgerConfig, ManualClock, TransactionId, TransactionResult, TransactionService, User, UserId,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Use(u64),
    /// Cancel the n-th successful use seen so far (modulo count).
    Cancel(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..5_000).prop_map(Op::Use),
        1 => (0usize..16).prop_map(Op::Cancel),
    ]
}

fn services() -> (Arc<AccountService>, TransactionService, Arc<InMemoryLedger>) {
    let users = Arc::new(InMemoryUserDirectory::new());
    users.register(User::new(1, "Pobi")).unwrap();
    let accounts = Arc::new(AccountService::new(
        users,
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )),
        LedgerConfig::default(),
    ));
    let ledger = Arc::new(InMemoryLedger::new());
    let transactions = TransactionService::new(accounts.clone(), ledger.clone());
    (accounts, transactions, ledger)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    /// Property: the balance always equals the initial deposit minus
    /// successful uses plus successful cancels, and every attempt is logged.
    #[test]
    fn balance_matches_ledger(
        initial in 0u64..20_000,
        ops in prop::collection::vec(op(), 1..40)
    ) {
        let (accounts, transactions, ledger) = services();
        let number = accounts.create_account(UserId(1), initial).unwrap().account_number;

        let mut expected = initial;
        let mut uses: Vec<(TransactionId, u64)> = Vec::new();
        let mut cancelled: Vec<TransactionId> = Vec::new();
        let mut attempted = 0usize;

        for op in &ops {
            match *op {
                Op::Use(amount) => {
                    attempted += 1;
                    match transactions.use_balance(UserId(1), number, amount) {
                        Ok(outcome) => {
                            prop_assert!(amount <= expected);
                            expected -= amount;
                            uses.push((outcome.transaction_id, amount));
                        }
                        Err(e) => {
                            prop_assert_eq!(e.code(), Some(ErrorCode::AmountExceedsBalance));
                            prop_assert!(amount > expected);
                        }
                    }
                }
                Op::Cancel(pick) => {
                    if uses.is_empty() {
                        continue;
                    }
                    let (id, amount) = uses[pick % uses.len()].clone();
                    attempted += 1;
                    match transactions.cancel_balance(&id, number, amount) {
                        Ok(_) => {
                            prop_assert!(!cancelled.contains(&id));
                            expected += amount;
                            cancelled.push(id);
                        }
                        Err(e) => {
                            prop_assert_eq!(e.code(), Some(ErrorCode::TransactionAlreadyCancelled));
                            prop_assert!(cancelled.contains(&id));
                        }
                    }
                }
            }
            prop_assert_eq!(accounts.get_account(number).unwrap().balance, expected);
        }

        let logged = ledger.all().unwrap();
        prop_assert_eq!(logged.len(), attempted);

        let successes = logged
            .iter()
            .filter(|tx| tx.result == TransactionResult::Success)
            .count();
        prop_assert_eq!(successes, uses.len() + cancelled.len());
    }

    /// Property: using and then cancelling the same amount restores the balance exactly.
    #[test]
    fn use_then_cancel_round_trips(initial in 1u64..1_000_000, fraction in 1u64..=100) {
        let (accounts, transactions, _) = services();
        let number = accounts.create_account(UserId(1), initial).unwrap().account_number;
        let amount = (initial * fraction / 100).max(1);

        let used = transactions.use_balance(UserId(1), number, amount).unwrap();
        prop_assert_eq!(accounts.get_account(number).unwrap().balance, initial - amount);

        transactions.cancel_balance(&used.transaction_id, number, amount).unwrap();
        prop_assert_eq!(accounts.get_account(number).unwrap().balance, initial);
    }
}
