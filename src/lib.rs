// Bank Core - account/transaction engine
// Exposes all modules for use in the CLI and tests

pub mod admin;
pub mod audit;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod ids;
pub mod interest;
pub mod locks;
pub mod processor;
pub mod statement;
pub mod store;
pub mod temporal;

// Re-export commonly used types
pub use admin::{AccountAdministration, AccountProduct, ProductTerms};
pub use audit::AuditLedger;
pub use config::{BankConfig, UnknownActorPolicy};
pub use db::{setup_database, SqliteStore, SYSTEM_USER_ID};
pub use entities::{
    actions, Account, AccountKind, AccountOwner, AccountStatus, AccountType, AuditEntry, Customer,
    CustomerProfile, CustomerType, EmploymentDetails, InvestmentTerms, JournalRecord, SavingsTerms,
    Transaction, TransactionType,
};
pub use error::{BankError, BusinessRule, Result};
pub use ids::IdGenerator;
pub use interest::{InterestAccrualScheduler, SchedulerHandle, SweepReport};
pub use locks::{AccountGuard, AccountLocks};
pub use processor::{TransactionOutcome, TransactionProcessor};
pub use statement::{export_statement, export_statement_to_path};
pub use store::{
    AuditRetention, BankStore, Changeset, Identity, IdentityProvider, Repository, Role,
    TransactionLog, UnitOfWork,
};
pub use temporal::{Clock, FixedClock, SystemClock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
