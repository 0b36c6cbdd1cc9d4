// Operator CLI for the banking engine
//
// bank-core [--config FILE] <init | sweep | run-interest | prune-audit [DAYS] | statement ACCOUNT [FILE]>

use anyhow::{bail, Context, Result};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bank_core::{
    export_statement, export_statement_to_path, AccountLocks, AuditLedger, BankConfig, Clock,
    InterestAccrualScheduler, SqliteStore, SystemClock, TransactionProcessor,
};

const USAGE: &str = "usage: bank-core [--config FILE] <init | sweep | run-interest | prune-audit [DAYS] | statement ACCOUNT [FILE]>";

/// Wired engine components over one database
struct Engine {
    config: BankConfig,
    store: Arc<SqliteStore>,
    ledger: Arc<AuditLedger<SqliteStore>>,
    locks: Arc<AccountLocks>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    fn open(config: BankConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Arc::new(
            AuditLedger::new(Arc::clone(&store), Arc::clone(&clock))
                .with_policy(config.audit.unknown_actor),
        );
        info!(db = %config.database_path.display(), "database opened");

        Ok(Engine {
            config,
            store,
            ledger,
            locks: Arc::new(AccountLocks::new()),
            clock,
        })
    }

    fn scheduler(&self) -> Arc<InterestAccrualScheduler<SqliteStore>> {
        Arc::new(InterestAccrualScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            Arc::clone(&self.locks),
            Arc::clone(&self.clock),
        ))
    }

    fn processor(&self) -> TransactionProcessor<SqliteStore> {
        TransactionProcessor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            Arc::clone(&self.locks),
            Arc::clone(&self.clock),
        )
    }
}

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let config_path = take_config_flag(&mut args)?;
    let config = BankConfig::load(config_path.as_deref())?;
    init_tracing(&config);

    let Some(command) = args.first().cloned() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let rest = &args[1..];

    match command.as_str() {
        "init" => run_init(config),
        "sweep" => run_sweep(config),
        "run-interest" => run_interest(config),
        "prune-audit" => run_prune_audit(config, rest.first().map(String::as_str)),
        "statement" => match rest {
            [account] => run_statement(config, account, None),
            [account, file] => run_statement(config, account, Some(Path::new(file))),
            _ => bail!("{}", USAGE),
        },
        other => {
            eprintln!("unknown command: {}\n{}", other, USAGE);
            std::process::exit(2);
        }
    }
}

fn take_config_flag(args: &mut Vec<String>) -> Result<Option<PathBuf>> {
    let Some(pos) = args.iter().position(|a| a == "--config") else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("--config needs a file path\n{}", USAGE);
    }
    let path = PathBuf::from(args.remove(pos + 1));
    args.remove(pos);
    Ok(Some(path))
}

/// RUST_LOG wins over the configured filter
fn init_tracing(config: &BankConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run_init(config: BankConfig) -> Result<()> {
    let engine = Engine::open(config)?;
    println!(
        "✓ Database initialized with WAL mode at {}",
        engine.config.database_path.display()
    );
    Ok(())
}

fn run_sweep(config: BankConfig) -> Result<()> {
    let engine = Engine::open(config)?;
    let report = engine.scheduler().sweep()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_interest(config: BankConfig) -> Result<()> {
    let engine = Engine::open(config)?;
    let interval = engine.config.sweep_interval();
    let _handle = engine.scheduler().start(interval)?;

    // runs until the process is killed
    loop {
        thread::park();
    }
}

fn run_prune_audit(config: BankConfig, days: Option<&str>) -> Result<()> {
    let days = match days {
        Some(d) => d
            .parse()
            .with_context(|| format!("DAYS must be a whole number, got {:?}", d))?,
        None => config.audit.retention_days,
    };

    let engine = Engine::open(config)?;
    let removed = engine.ledger.delete_older_than(days)?;
    println!("✓ Removed {} audit entries older than {} days", removed, days);
    Ok(())
}

fn run_statement(config: BankConfig, account: &str, file: Option<&Path>) -> Result<()> {
    let engine = Engine::open(config)?;
    let history = engine.processor().transaction_history(account)?;

    match file {
        Some(path) => {
            let written = export_statement_to_path(&history, path)?;
            println!("✓ Wrote {} transactions to {}", written, path.display());
        }
        None => {
            export_statement(&history, io::stdout().lock())?;
        }
    }
    Ok(())
}
