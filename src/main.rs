//! Account Ledger CLI
//!
//! Replays a CSV command script against a fresh in-memory ledger and
//! prints the final account states.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- script.csv > accounts.csv
//! cargo run -- script.csv ledger.csv > accounts.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `LEDGER_MAX_ACCOUNTS`, `LEDGER_CANCEL_WINDOW_DAYS`,
//!   `LEDGER_MAX_COMMIT_ATTEMPTS`: override the default limits

use account_ledger::{EngineError, EngineResult, LedgerConfig, LedgerEngine};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(EngineError::MissingArgument);
    }

    let config = LedgerConfig::from_env()?;

    let input_path = &args[1];
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let mut engine = LedgerEngine::new(config);
    engine.process_csv(reader)?;

    if let Some(ledger_path) = args.get(2) {
        let ledger_file = File::create(ledger_path)?;
        engine.write_ledger(BufWriter::new(ledger_file))?;
    }

    let stdout = io::stdout();
    let handle = stdout.lock();
    engine.write_accounts(handle)?;

    Ok(())
}
