//! Script replay engine.
//!
//! Wires the services to in-memory collaborators and replays a CSV command
//! script against them, one row at a time. Rejected commands are logged at
//! warn level and skipped; the account and ledger state can then be written
//! out as CSV reports.

use crate::account::AccountNumber;
use crate::account_service::AccountService;
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{EngineError, EngineResult, LedgerError};
use crate::ledger::InMemoryLedger;
use crate::store::InMemoryAccountStore;
use crate::transaction::TransactionId;
use crate::transaction_service::TransactionService;
use crate::user::{InMemoryUserDirectory, User, UserId};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// Raw script row.
///
/// `ref` is the display name for `register` and a script-local label for
/// `use` / `cancel`.
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    pub op: String,
    pub user: Option<u64>,
    pub account: Option<String>,
    pub amount: Option<u64>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

/// A validated script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        user: UserId,
        name: String,
    },
    Create {
        user: UserId,
        initial_balance: u64,
    },
    Close {
        user: UserId,
        account: AccountNumber,
    },
    Use {
        user: UserId,
        account: AccountNumber,
        amount: u64,
        label: Option<String>,
    },
    Cancel {
        account: AccountNumber,
        amount: u64,
        label: String,
    },
}

impl CommandRecord {
    /// Validates the raw row into a [`Command`].
    pub fn parse(&self) -> std::result::Result<Command, String> {
        match self.op.trim().to_lowercase().as_str() {
            "register" => Ok(Command::Register {
                user: self.user()?,
                name: self.reference().ok_or("register needs a name in `ref`")?,
            }),
            "create" => Ok(Command::Create {
                user: self.user()?,
                initial_balance: self.amount.unwrap_or(0),
            }),
            "close" => Ok(Command::Close {
                user: self.user()?,
                account: self.account()?,
            }),
            "use" => Ok(Command::Use {
                user: self.user()?,
                account: self.account()?,
                amount: self.amount()?,
                label: self.reference(),
            }),
            "cancel" => Ok(Command::Cancel {
                account: self.account()?,
                amount: self.amount()?,
                label: self
                    .reference()
                    .ok_or("cancel needs the label of a use in `ref`")?,
            }),
            other => Err(format!("unknown op {other:?}")),
        }
    }

    fn user(&self) -> std::result::Result<UserId, String> {
        self.user.map(UserId).ok_or_else(|| "missing user".to_string())
    }

    fn account(&self) -> std::result::Result<AccountNumber, String> {
        let raw = self.account.as_deref().ok_or("missing account")?;
        raw.parse().map_err(|e| format!("{e}"))
    }

    fn amount(&self) -> std::result::Result<u64, String> {
        self.amount.ok_or_else(|| "missing amount".to_string())
    }

    fn reference(&self) -> Option<String> {
        self.reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    }
}

/// The balance engine over in-memory collaborators.
pub struct LedgerEngine {
    users: Arc<InMemoryUserDirectory>,
    store: Arc<InMemoryAccountStore>,
    ledger: Arc<InMemoryLedger>,
    accounts: Arc<AccountService>,
    transactions: TransactionService,

    /// Script labels of `use` rows, for later `cancel` rows.
    labels: HashMap<String, TransactionId>,
}

impl LedgerEngine {
    /// Creates an empty engine on the wall clock.
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let users = Arc::new(InMemoryUserDirectory::new());
        let store = Arc::new(InMemoryAccountStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let accounts = Arc::new(AccountService::new(
            users.clone(),
            store.clone(),
            clock,
            config,
        ));
        let transactions = TransactionService::new(accounts.clone(), ledger.clone());

        LedgerEngine {
            users,
            store,
            ledger,
            accounts,
            transactions,
            labels: HashMap::new(),
        }
    }

    pub fn users(&self) -> &InMemoryUserDirectory {
        &self.users
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.transactions
    }

    /// Transaction id recorded for a script label.
    pub fn labelled(&self, label: &str) -> Option<&TransactionId> {
        self.labels.get(label)
    }

    /// Replays a command script in streaming fashion.
    ///
    /// Invalid rows and rejected commands are logged at warn level and skipped.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> EngineResult<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<CommandRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => match record.parse() {
                    Ok(command) => {
                        if let Err(e) = self.apply(command) {
                            warn!("Row {}: {}", row_num, e);
                        } else {
                            debug!("Row {}: applied {}", row_num, record.op);
                        }
                    }
                    Err(message) => warn!("Row {}: Invalid command: {}", row_num, message),
                },
                Err(e) => warn!("Row {}: CSV parse error: {}", row_num, e),
            }
        }

        Ok(())
    }

    /// Applies one command to the services.
    ///
    /// A `use` whose label is already taken is rejected before it runs.
    pub fn apply(&mut self, command: Command) -> EngineResult<()> {
        match command {
            Command::Register { user, name } => {
                self.users
                    .register(User { id: user, name })
                    .map_err(LedgerError::from)?;
            }
            Command::Create {
                user,
                initial_balance,
            } => {
                self.accounts.create_account(user, initial_balance)?;
            }
            Command::Close { user, account } => {
                self.accounts.close_account(user, account)?;
            }
            Command::Use {
                user,
                account,
                amount,
                label,
            } => {
                if let Some(label) = label.as_ref().filter(|l| self.labels.contains_key(*l)) {
                    return Err(EngineError::DuplicateLabel(label.clone()));
                }
                let outcome = self.transactions.use_balance(user, account, amount)?;
                if let Some(label) = label {
                    self.labels.insert(label, outcome.transaction_id);
                }
            }
            Command::Cancel {
                account,
                amount,
                label,
            } => {
                // Unknown labels resolve to an id no ledger entry can have.
                let original = self
                    .labels
                    .get(&label)
                    .cloned()
                    .unwrap_or_else(|| TransactionId::from(format!("label:{label}")));
                self.transactions.cancel_balance(&original, account, amount)?;
            }
        }
        Ok(())
    }

    /// Writes every account as CSV, sorted by account number.
    pub fn write_accounts<W: Write>(&self, writer: W) -> EngineResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["account", "user", "status", "balance"])?;

        let mut accounts = self.store.all()?;
        accounts.sort_by_key(|a| a.number);

        for account in accounts {
            csv_writer.write_record([
                account.number.to_string(),
                account.user_id.to_string(),
                account.status.to_string(),
                account.balance.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the whole ledger as CSV, in append order.
    pub fn write_ledger<W: Write>(&self, writer: W) -> EngineResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "transaction_id",
            "account",
            "type",
            "result",
            "amount",
            "balance_snapshot",
            "transacted_at",
            "cancels",
        ])?;

        for tx in self.ledger.all()? {
            csv_writer.write_record([
                tx.transaction_id.to_string(),
                tx.account_number.to_string(),
                tx.kind.to_string(),
                tx.result.to_string(),
                tx.amount.to_string(),
                tx.balance_snapshot.to_string(),
                tx.transacted_at.to_rfc3339(),
                tx.cancels.map(|c| c.to_string()).unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}
