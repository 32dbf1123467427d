//! Error types for the account ledger.
//!
//! [`LedgerError`] is the domain taxonomy surfaced by the services,
//! [`StoreError`] covers the storage collaborators and [`EngineError`]
//! covers the script replay / CLI layer.

use crate::account::AccountNumber;
use crate::transaction::TransactionId;
use crate::user::UserId;
use std::fmt;
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Result type alias for script replay and the CLI.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Stable machine-readable kind of a domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UserNotFound,
    AccountNotFound,
    AccountLimitExceeded,
    UserAccountMismatch,
    AccountAlreadyClosed,
    BalanceNotEmpty,
    AmountExceedsBalance,
    AccountNotActive,
    InvalidAmount,
    TransactionNotFound,
    TransactionNotCancellable,
    AccountTransactionMismatch,
    AmountMismatch,
    TransactionTooOld,
    TransactionAlreadyCancelled,
    TransientConflict,
    UnreconciledCommit,
}

impl ErrorCode {
    /// Human-readable description of the error kind.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::UserNotFound => "User does not exist",
            ErrorCode::AccountNotFound => "Account does not exist",
            ErrorCode::AccountLimitExceeded => {
                "User already owns the maximum number of active accounts"
            }
            ErrorCode::UserAccountMismatch => "Account is not owned by the requesting user",
            ErrorCode::AccountAlreadyClosed => "Account is already closed",
            ErrorCode::BalanceNotEmpty => "Account still holds a balance",
            ErrorCode::AmountExceedsBalance => "Amount exceeds the account balance",
            ErrorCode::AccountNotActive => "Account is not active",
            ErrorCode::InvalidAmount => "Amount is not valid",
            ErrorCode::TransactionNotFound => "Transaction does not exist",
            ErrorCode::TransactionNotCancellable => {
                "Only successful use transactions can be cancelled"
            }
            ErrorCode::AccountTransactionMismatch => "Transaction does not belong to the account",
            ErrorCode::AmountMismatch => "Partial cancellation is not allowed",
            ErrorCode::TransactionTooOld => "Transaction is too old to cancel",
            ErrorCode::TransactionAlreadyCancelled => "Transaction has already been cancelled",
            ErrorCode::TransientConflict => "Account was modified concurrently, try again",
            ErrorCode::UnreconciledCommit => {
                "Account changed but its ledger entry could not be written"
            }
        }
    }

    /// Upper snake case name, suitable for reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::AccountNotFound => "ACCOUNT_NOT_FOUND",
            ErrorCode::AccountLimitExceeded => "ACCOUNT_LIMIT_EXCEEDED",
            ErrorCode::UserAccountMismatch => "USER_ACCOUNT_MISMATCH",
            ErrorCode::AccountAlreadyClosed => "ACCOUNT_ALREADY_CLOSED",
            ErrorCode::BalanceNotEmpty => "BALANCE_NOT_EMPTY",
            ErrorCode::AmountExceedsBalance => "AMOUNT_EXCEEDS_BALANCE",
            ErrorCode::AccountNotActive => "ACCOUNT_NOT_ACTIVE",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ErrorCode::TransactionNotCancellable => "TRANSACTION_NOT_CANCELLABLE",
            ErrorCode::AccountTransactionMismatch => "ACCOUNT_TRANSACTION_MISMATCH",
            ErrorCode::AmountMismatch => "AMOUNT_MISMATCH",
            ErrorCode::TransactionTooOld => "TRANSACTION_TOO_OLD",
            ErrorCode::TransactionAlreadyCancelled => "TRANSACTION_ALREADY_CANCELLED",
            ErrorCode::TransientConflict => "TRANSIENT_CONFLICT",
            ErrorCode::UnreconciledCommit => "UNRECONCILED_COMMIT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain errors returned by the account and transaction services.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("account {0} not found")]
    AccountNotFound(AccountNumber),

    #[error("user {user} already owns {limit} active accounts")]
    AccountLimitExceeded { user: UserId, limit: usize },

    #[error("account {account} is not owned by user {user}")]
    UserAccountMismatch { user: UserId, account: AccountNumber },

    #[error("account {0} is already closed")]
    AccountAlreadyClosed(AccountNumber),

    #[error("account {account} still holds a balance of {balance}")]
    BalanceNotEmpty { account: AccountNumber, balance: u64 },

    #[error("amount {amount} exceeds balance {balance}")]
    AmountExceedsBalance { amount: u64, balance: u64 },

    #[error("account {0} is not active")]
    AccountNotActive(AccountNumber),

    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount { amount: u64, reason: &'static str },

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("transaction {0} is not a successful use and cannot be cancelled")]
    TransactionNotCancellable(TransactionId),

    #[error("transaction {transaction} does not belong to account {account}")]
    AccountTransactionMismatch {
        transaction: TransactionId,
        account: AccountNumber,
    },

    #[error("cancel amount {requested} does not match transaction amount {original}")]
    AmountMismatch { original: u64, requested: u64 },

    #[error("transaction {0} is outside the cancellation window")]
    TransactionTooOld(TransactionId),

    #[error("transaction {0} has already been cancelled")]
    TransactionAlreadyCancelled(TransactionId),

    #[error("account {account} changed concurrently; gave up after {attempts} attempts")]
    TransientConflict { account: AccountNumber, attempts: u32 },

    /// The account row kept a mutation that has no ledger entry.
    #[error("account {account} holds unrecorded balance {balance}: {cause}")]
    UnreconciledCommit {
        account: AccountNumber,
        balance: u64,
        #[source]
        cause: StoreError,
    },

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Domain error kind, or `None` for opaque store failures.
    pub fn code(&self) -> Option<ErrorCode> {
        let code = match self {
            LedgerError::UserNotFound(_) => ErrorCode::UserNotFound,
            LedgerError::AccountNotFound(_) => ErrorCode::AccountNotFound,
            LedgerError::AccountLimitExceeded { .. } => ErrorCode::AccountLimitExceeded,
            LedgerError::UserAccountMismatch { .. } => ErrorCode::UserAccountMismatch,
            LedgerError::AccountAlreadyClosed(_) => ErrorCode::AccountAlreadyClosed,
            LedgerError::BalanceNotEmpty { .. } => ErrorCode::BalanceNotEmpty,
            LedgerError::AmountExceedsBalance { .. } => ErrorCode::AmountExceedsBalance,
            LedgerError::AccountNotActive(_) => ErrorCode::AccountNotActive,
            LedgerError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
            LedgerError::TransactionNotFound(_) => ErrorCode::TransactionNotFound,
            LedgerError::TransactionNotCancellable(_) => ErrorCode::TransactionNotCancellable,
            LedgerError::AccountTransactionMismatch { .. } => ErrorCode::AccountTransactionMismatch,
            LedgerError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
            LedgerError::TransactionTooOld(_) => ErrorCode::TransactionTooOld,
            LedgerError::TransactionAlreadyCancelled(_) => ErrorCode::TransactionAlreadyCancelled,
            LedgerError::TransientConflict { .. } => ErrorCode::TransientConflict,
            LedgerError::UnreconciledCommit { .. } => ErrorCode::UnreconciledCommit,
            LedgerError::Store(_) => return None,
        };
        Some(code)
    }
}

/// Failures raised by account and transaction storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Compare-and-swap on the account version failed.
    #[error("account {account} version conflict (expected {expected}, found {actual})")]
    VersionConflict {
        account: AccountNumber,
        expected: u64,
        actual: u64,
    },

    #[error("account number {0} is already assigned")]
    DuplicateAccountNumber(AccountNumber),

    #[error("transaction id {0} is already recorded")]
    DuplicateTransactionId(TransactionId),

    #[error("account row {0} does not exist")]
    UnknownAccount(u64),

    #[error("account number space is exhausted")]
    NumbersExhausted,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while replaying a command script.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Command rejected by the services
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// Script label already names an earlier use
    #[error("Label {0:?} is already used by an earlier transaction")]
    DuplicateLabel(String),

    /// Report could not be read from the stores
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid script record
    #[error("Invalid command at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Unparsable configuration value
    #[error("Invalid configuration {key}={value}: {message}")]
    InvalidConfig {
        key: &'static str,
        value: String,
        message: String,
    },

    /// Missing input file argument
    #[error("Missing input file argument. Usage: account-ledger <script.csv> [ledger.csv]")]
    MissingArgument,
}
