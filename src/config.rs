//! Tunable limits of the balance engine.

use crate::account::AccountNumber;
use crate::error::EngineError;
use chrono::Duration;
use std::env;
use std::str::FromStr;

/// Environment variable overriding [`LedgerConfig::max_active_accounts_per_user`].
pub const ENV_MAX_ACCOUNTS: &str = "LEDGER_MAX_ACCOUNTS";
/// Environment variable overriding the cancellation window, in whole days.
pub const ENV_CANCEL_WINDOW_DAYS: &str = "LEDGER_CANCEL_WINDOW_DAYS";
/// Environment variable overriding [`LedgerConfig::max_commit_attempts`].
pub const ENV_MAX_COMMIT_ATTEMPTS: &str = "LEDGER_MAX_COMMIT_ATTEMPTS";

/// Limits and policies shared by the account and transaction services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Maximum number of ACTIVE accounts a single user may own.
    pub max_active_accounts_per_user: usize,

    /// How long after a use transaction it may still be cancelled.
    pub cancellation_window: Duration,

    /// Attempts at the optimistic account commit before giving up.
    pub max_commit_attempts: u32,

    /// Number issued to the very first account.
    pub seed_account_number: AccountNumber,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            max_active_accounts_per_user: 10,
            cancellation_window: Duration::days(365),
            max_commit_attempts: 3,
            seed_account_number: AccountNumber::SEED,
        }
    }
}

impl LedgerConfig {
    /// Builds a configuration from the defaults overlaid with `LEDGER_*`
    /// environment variables.
    pub fn from_env() -> std::result::Result<Self, EngineError> {
        let mut config = LedgerConfig::default();

        if let Some(max) = read_var::<usize>(ENV_MAX_ACCOUNTS)? {
            config.max_active_accounts_per_user = max;
        }
        if let Some(days) = read_var::<u32>(ENV_CANCEL_WINDOW_DAYS)? {
            config.cancellation_window = Duration::days(i64::from(days));
        }
        if let Some(attempts) = read_var::<u32>(ENV_MAX_COMMIT_ATTEMPTS)? {
            if attempts == 0 {
                return Err(EngineError::InvalidConfig {
                    key: ENV_MAX_COMMIT_ATTEMPTS,
                    value: attempts.to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            config.max_commit_attempts = attempts;
        }

        Ok(config)
    }

    pub fn with_max_active_accounts(mut self, max: usize) -> Self {
        self.max_active_accounts_per_user = max;
        self
    }

    pub fn with_cancellation_window(mut self, window: Duration) -> Self {
        self.cancellation_window = window;
        self
    }

    /// Values below one are raised to one.
    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    pub fn with_seed_account_number(mut self, seed: AccountNumber) -> Self {
        self.seed_account_number = seed;
        self
    }
}

fn read_var<T>(key: &'static str) -> std::result::Result<Option<T>, EngineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| EngineError::InvalidConfig {
                key,
                value: raw.clone(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
