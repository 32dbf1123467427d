//! # Account Ledger
//!
//! A balance engine for user-owned bank accounts. Accounts are opened and
//! closed under ownership and per-user limits; every attempt to use or cancel
//! funds is recorded in an append-only transaction ledger.
//!
//! ## Design Principles
//!
//! - **Integer minor units**: balances and amounts are `u64`, never negative
//! - **Per-account serialization**: a keyed lock plus a versioned
//!   compare-and-swap save guard every read-check-mutate-persist sequence
//! - **Everything is traced**: rejected balance operations still leave a
//!   FAIL entry in the ledger
//! - **Exactly-once cancellation**: a use can be reversed once, for its exact amount
//!
//! ## Example
//!
//! ```
//! use account_ledger::{LedgerEngine, User, UserId};
//!
//! let engine = LedgerEngine::default();
//! engine.users().register(User::new(1, "Pobi")).unwrap();
//!
//! let account = engine.accounts().create_account(UserId(1), 10_000).unwrap();
//! assert_eq!(account.account_number.to_string(), "1000000000");
//!
//! let used = engine
//!     .transactions()
//!     .use_balance(UserId(1), account.account_number, 3_000)
//!     .unwrap();
//! engine
//!     .transactions()
//!     .cancel_balance(&used.transaction_id, account.account_number, 3_000)
//!     .unwrap();
//! ```

pub mod account;
pub mod account_service;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod store;
pub mod transaction;
pub mod transaction_service;
pub mod user;

pub use account::{Account, AccountId, AccountNumber, AccountStatus, AccountSummary, NewAccount};
pub use account_service::AccountService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use engine::{Command, CommandRecord, LedgerEngine};
pub use error::{EngineError, EngineResult, ErrorCode, LedgerError, Result, StoreError};
pub use ledger::{InMemoryLedger, TransactionLedger};
pub use store::{AccountStore, InMemoryAccountStore};
pub use transaction::{
    NewTransaction, Transaction, TransactionDetail, TransactionId, TransactionOutcome,
    TransactionResult, TransactionType,
};
pub use transaction_service::TransactionService;
pub use user::{InMemoryUserDirectory, User, UserDirectory, UserId};
