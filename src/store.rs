// Persistence & identity collaborators
//
// The engine only talks to these traits. `db::SqliteStore` implements all
// of them; tests can swap in anything else.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::{Account, AuditEntry, Customer, Transaction};

// ============================================================================
// KEYED REPOSITORIES
// ============================================================================

/// Keyed store for one entity type
///
/// Keys: account number, customer id, transaction id, audit id.
pub trait Repository<T> {
    fn find_by_id(&self, id: &str) -> Result<Option<T>>;
    fn find_all(&self) -> Result<Vec<T>>;
    fn save(&self, item: &T) -> Result<()>;
    fn update(&self, item: &T) -> Result<()>;
    /// Returns false when nothing matched
    fn delete(&self, id: &str) -> Result<bool>;
}

/// Ledger queries beyond the keyed lookups
pub trait TransactionLog {
    /// Oldest first
    fn transactions_for_account(&self, account_number: &str) -> Result<Vec<Transaction>>;
}

// ============================================================================
// UNIT OF WORK
// ============================================================================

/// Everything one business operation changed
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    /// Updated in place (must already exist)
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub audit: Vec<AuditEntry>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.transactions.is_empty() && self.audit.is_empty()
    }
}

/// Applies a changeset all-or-nothing
pub trait UnitOfWork {
    fn commit(&self, changes: &Changeset) -> Result<()>;
}

/// The only deletion path for audit entries
pub trait AuditRetention {
    /// Remove entries strictly older than `cutoff`, returning the count
    fn delete_audit_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Oldest first
    fn audit_for_user(&self, user_id: &str) -> Result<Vec<AuditEntry>>;
}

// ============================================================================
// IDENTITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    BankEmployee,
    Administrator,
    /// Reserved for engine-originated actions
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::BankEmployee => "BANK_EMPLOYEE",
            Role::Administrator => "ADMINISTRATOR",
            Role::System => "SYSTEM",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CUSTOMER" => Ok(Role::Customer),
            "BANK_EMPLOYEE" => Ok(Role::BankEmployee),
            "ADMINISTRATOR" => Ok(Role::Administrator),
            "SYSTEM" => Ok(Role::System),
            other => Err(anyhow::anyhow!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: &str, username: &str, role: Role) -> Self {
        Identity {
            user_id: user_id.to_string(),
            username: username.to_string(),
            role,
        }
    }
}

/// Resolves actor ids to known identities
///
/// Credential checks happen elsewhere; the engine only needs to know
/// whether an id exists and what role it has.
pub trait IdentityProvider {
    fn resolve(&self, user_id: &str) -> Result<Option<Identity>>;
    fn register(&self, identity: &Identity) -> Result<()>;
}

// ============================================================================
// COMBINED STORE
// ============================================================================

/// Every collaborator the engine needs, behind one handle
pub trait BankStore:
    Repository<Account>
    + Repository<Customer>
    + Repository<Transaction>
    + Repository<AuditEntry>
    + TransactionLog
    + UnitOfWork
    + AuditRetention
    + IdentityProvider
    + Send
    + Sync
{
}

impl<T> BankStore for T where
    T: Repository<Account>
        + Repository<Customer>
        + Repository<Transaction>
        + Repository<AuditEntry>
        + TransactionLog
        + UnitOfWork
        + AuditRetention
        + IdentityProvider
        + Send
        + Sync
{
}
