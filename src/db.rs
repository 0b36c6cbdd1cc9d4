// SQLite persistence for accounts, customers, ledger, audit trail and users
//
// Money is stored as decimal TEXT, dates as ISO-8601, timestamps as
// RFC 3339 UTC with fixed microsecond precision so text order is time order.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::entities::{
    Account, AccountKind, AccountOwner, AccountStatus, AccountType, AuditEntry, Customer,
    CustomerProfile, CustomerType, EmploymentDetails, InvestmentTerms, SavingsTerms, Transaction,
    TransactionType,
};
use crate::store::{
    AuditRetention, Changeset, Identity, IdentityProvider, Repository, Role, TransactionLog,
    UnitOfWork,
};

/// Reserved identity for engine-originated audit entries
pub const SYSTEM_USER_ID: &str = "SYSTEM";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Identity
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            role TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO users (user_id, username, role) VALUES (?1, ?2, ?3)",
        params![SYSTEM_USER_ID, "system", Role::System.as_str()],
    )?;

    // ==========================================================================
    // Customers & Accounts
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS customers (
            customer_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            username TEXT NOT NULL,
            first_name TEXT NOT NULL,
            surname TEXT NOT NULL,
            address TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            email TEXT NOT NULL,
            customer_type TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Variant columns are NULL for the variants that don't use them
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            account_number TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            owner_user_id TEXT NOT NULL,
            account_type TEXT NOT NULL,
            balance TEXT NOT NULL,
            date_created TEXT NOT NULL,
            date_opened TEXT NOT NULL,
            status TEXT NOT NULL,
            interest_rate TEXT,
            minimum_balance TEXT,
            last_interest_applied TEXT,
            employer_name TEXT,
            employer_address TEXT,
            employed INTEGER
        )",
        [],
    )?;

    // ==========================================================================
    // Ledger & Audit Trail
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            transaction_id TEXT PRIMARY KEY,
            account_number TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            amount TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            description TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_trail (
            audit_id TEXT PRIMARY KEY,
            action TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            user_id TEXT NOT NULL,
            details TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_customer ON accounts(customer_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_number, timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_trail(timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_trail(user_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// TEXT ENCODINGS
// ============================================================================

fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}

fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date: {}", s))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("Invalid decimal: {}", s))
}

fn parse_optional<T>(
    value: Option<String>,
    column: &str,
    parse: impl Fn(&str) -> Result<T>,
) -> Result<T> {
    let text = value.ok_or_else(|| anyhow!("Missing column {}", column))?;
    parse(&text)
}

// ============================================================================
// ROW SHAPES
// ============================================================================

const ACCOUNT_COLUMNS: &str = "account_number, customer_id, owner_user_id, account_type, balance,
     date_created, date_opened, status, interest_rate, minimum_balance,
     last_interest_applied, employer_name, employer_address, employed";

/// Raw account columns, converted outside the rusqlite row callback
struct AccountRow {
    account_number: String,
    customer_id: String,
    owner_user_id: String,
    account_type: String,
    balance: String,
    date_created: String,
    date_opened: String,
    status: String,
    interest_rate: Option<String>,
    minimum_balance: Option<String>,
    last_interest_applied: Option<String>,
    employer_name: Option<String>,
    employer_address: Option<String>,
    employed: Option<bool>,
}

impl AccountRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AccountRow {
            account_number: row.get(0)?,
            customer_id: row.get(1)?,
            owner_user_id: row.get(2)?,
            account_type: row.get(3)?,
            balance: row.get(4)?,
            date_created: row.get(5)?,
            date_opened: row.get(6)?,
            status: row.get(7)?,
            interest_rate: row.get(8)?,
            minimum_balance: row.get(9)?,
            last_interest_applied: row.get(10)?,
            employer_name: row.get(11)?,
            employer_address: row.get(12)?,
            employed: row.get(13)?,
        })
    }

    fn into_account(self) -> Result<Account> {
        let account_type = AccountType::from_str(&self.account_type)?;
        let kind = match account_type {
            AccountType::Savings => AccountKind::Savings(SavingsTerms {
                interest_rate: parse_optional(self.interest_rate, "interest_rate", parse_decimal)?,
                minimum_balance: parse_optional(
                    self.minimum_balance,
                    "minimum_balance",
                    parse_decimal,
                )?,
                last_interest_applied: parse_optional(
                    self.last_interest_applied,
                    "last_interest_applied",
                    parse_date,
                )?,
            }),
            AccountType::Investment => AccountKind::Investment(InvestmentTerms {
                interest_rate: parse_optional(self.interest_rate, "interest_rate", parse_decimal)?,
                last_interest_applied: parse_optional(
                    self.last_interest_applied,
                    "last_interest_applied",
                    parse_date,
                )?,
            }),
            AccountType::Cheque => AccountKind::Cheque(EmploymentDetails {
                employer_name: self.employer_name.unwrap_or_default(),
                employer_address: self.employer_address.unwrap_or_default(),
                employed: self.employed.unwrap_or(false),
            }),
        };

        let account = Account::new(
            self.account_number.clone(),
            parse_decimal(&self.balance)?,
            parse_date(&self.date_created)?,
            parse_date(&self.date_opened)?,
            AccountStatus::from_str(&self.status)?,
            AccountOwner::new(&self.customer_id, &self.owner_user_id),
            kind,
        )
        .with_context(|| format!("Corrupt account row {}", self.account_number))?;
        Ok(account)
    }
}

/// Column values for the variant-specific part of an account
struct VariantColumns {
    interest_rate: Option<String>,
    minimum_balance: Option<String>,
    last_interest_applied: Option<String>,
    employer_name: Option<String>,
    employer_address: Option<String>,
    employed: Option<bool>,
}

impl VariantColumns {
    fn of(account: &Account) -> Self {
        let mut cols = VariantColumns {
            interest_rate: account.interest_rate().map(|r| r.to_string()),
            minimum_balance: None,
            last_interest_applied: account.last_interest_applied().map(date_text),
            employer_name: None,
            employer_address: None,
            employed: None,
        };
        match account.kind() {
            AccountKind::Savings(terms) => {
                cols.minimum_balance = Some(terms.minimum_balance.to_string());
            }
            AccountKind::Investment(_) => {}
            AccountKind::Cheque(details) => {
                cols.employer_name = Some(details.employer_name.clone());
                cols.employer_address = Some(details.employer_address.clone());
                cols.employed = Some(details.employed);
            }
        }
        cols
    }
}

fn insert_account(conn: &Connection, account: &Account, upsert: bool) -> Result<()> {
    let cols = VariantColumns::of(account);
    let conflict = if upsert {
        "ON CONFLICT(account_number) DO UPDATE SET
            customer_id = excluded.customer_id,
            owner_user_id = excluded.owner_user_id,
            balance = excluded.balance,
            status = excluded.status,
            interest_rate = excluded.interest_rate,
            minimum_balance = excluded.minimum_balance,
            last_interest_applied = excluded.last_interest_applied,
            employer_name = excluded.employer_name,
            employer_address = excluded.employer_address,
            employed = excluded.employed"
    } else {
        ""
    };

    let sql = format!(
        "INSERT INTO accounts ({})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) {}",
        ACCOUNT_COLUMNS, conflict
    );
    conn.execute(
        &sql,
        params![
            account.account_number(),
            account.customer_id(),
            account.owner().user_id,
            account.account_type().as_str(),
            account.balance().to_string(),
            date_text(account.date_created()),
            date_text(account.date_opened()),
            account.status().as_str(),
            cols.interest_rate,
            cols.minimum_balance,
            cols.last_interest_applied,
            cols.employer_name,
            cols.employer_address,
            cols.employed,
        ],
    )
    .with_context(|| format!("Failed to insert account {}", account.account_number()))?;
    Ok(())
}

fn update_account(conn: &Connection, account: &Account) -> Result<()> {
    let cols = VariantColumns::of(account);
    let changed = conn
        .execute(
            "UPDATE accounts SET
                balance = ?2,
                status = ?3,
                interest_rate = ?4,
                minimum_balance = ?5,
                last_interest_applied = ?6,
                employer_name = ?7,
                employer_address = ?8,
                employed = ?9
             WHERE account_number = ?1",
            params![
                account.account_number(),
                account.balance().to_string(),
                account.status().as_str(),
                cols.interest_rate,
                cols.minimum_balance,
                cols.last_interest_applied,
                cols.employer_name,
                cols.employer_address,
                cols.employed,
            ],
        )
        .with_context(|| format!("Failed to update account {}", account.account_number()))?;

    if changed == 0 {
        bail!("Account {} does not exist", account.account_number());
    }
    Ok(())
}

fn load_accounts(conn: &Connection, where_clause: &str, key: &str) -> Result<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts {} ORDER BY date_created, account_number",
        ACCOUNT_COLUMNS, where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = if where_clause.is_empty() {
        stmt.query_map([], AccountRow::read)?
            .collect::<Result<Vec<_>, _>>()?
    } else {
        stmt.query_map(params![key], AccountRow::read)?
            .collect::<Result<Vec<_>, _>>()?
    };

    rows.into_iter().map(AccountRow::into_account).collect()
}

fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (transaction_id, account_number, transaction_type, amount, timestamp, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            tx.transaction_id,
            tx.account_number,
            tx.transaction_type.as_str(),
            tx.amount.to_string(),
            timestamp_text(tx.timestamp),
            tx.description,
        ],
    )
    .with_context(|| format!("Failed to insert transaction {}", tx.transaction_id))?;
    Ok(())
}

type TransactionRow = (String, String, String, String, String, String);

fn read_transaction(row: &Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_transaction(raw: TransactionRow) -> Result<Transaction> {
    let (id, account_number, ty, amount, timestamp, description) = raw;
    let tx = Transaction::with_id(
        id,
        TransactionType::from_str(&ty)?,
        parse_decimal(&amount)?,
        description,
        &account_number,
        parse_timestamp(&timestamp)?,
    )?;
    Ok(tx)
}

const TRANSACTION_COLUMNS: &str =
    "transaction_id, account_number, transaction_type, amount, timestamp, description";

/// Idempotent when `ignore_existing`; audit ids are unique per entry
fn insert_audit(conn: &Connection, entry: &AuditEntry, ignore_existing: bool) -> Result<()> {
    let verb = if ignore_existing {
        "INSERT OR IGNORE"
    } else {
        "INSERT"
    };
    let sql = format!(
        "{} INTO audit_trail (audit_id, action, timestamp, user_id, details)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        verb
    );
    conn.execute(
        &sql,
        params![
            entry.audit_id,
            entry.action,
            timestamp_text(entry.timestamp),
            entry.user_id,
            entry.details,
        ],
    )
    .with_context(|| format!("Failed to insert audit entry {}", entry.audit_id))?;
    Ok(())
}

type AuditRow = (String, String, String, String, String);

fn read_audit(row: &Row<'_>) -> rusqlite::Result<AuditRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_audit(raw: AuditRow) -> Result<AuditEntry> {
    let (audit_id, action, timestamp, user_id, details) = raw;
    Ok(AuditEntry {
        audit_id,
        action,
        timestamp: parse_timestamp(&timestamp)?,
        user_id,
        details,
    })
}

const AUDIT_COLUMNS: &str = "audit_id, action, timestamp, user_id, details";

// ============================================================================
// STORE
// ============================================================================

/// Every persistence collaborator over one SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Direct access to the underlying connection
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Every user id, customer id and account number on record
    pub fn known_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id FROM users
             UNION SELECT customer_id FROM customers
             UNION SELECT account_number FROM accounts",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn write_customer(conn: &Connection, customer: &Customer, insert: bool) -> Result<()> {
        let profile = customer.profile();
        let changed = if insert {
            conn.execute(
                "INSERT INTO customers (customer_id, user_id, username, first_name, surname, address, phone_number, email, customer_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    customer.customer_id(),
                    customer.user_id(),
                    customer.username(),
                    profile.first_name,
                    profile.surname,
                    profile.address,
                    profile.phone_number,
                    profile.email,
                    customer.customer_type().as_str(),
                ],
            )
        } else {
            conn.execute(
                "UPDATE customers SET
                    user_id = ?2, username = ?3, first_name = ?4, surname = ?5,
                    address = ?6, phone_number = ?7, email = ?8, customer_type = ?9
                 WHERE customer_id = ?1",
                params![
                    customer.customer_id(),
                    customer.user_id(),
                    customer.username(),
                    profile.first_name,
                    profile.surname,
                    profile.address,
                    profile.phone_number,
                    profile.email,
                    customer.customer_type().as_str(),
                ],
            )
        }
        .with_context(|| format!("Failed to write customer {}", customer.customer_id()))?;

        if changed == 0 {
            bail!("Customer {} does not exist", customer.customer_id());
        }

        for account in customer.view_accounts() {
            insert_account(conn, &account, true)?;
        }
        for entry in customer.audit_trail() {
            insert_audit(conn, &entry, true)?;
        }
        Ok(())
    }
}

// ============================================================================
// ACCOUNTS
// ============================================================================

impl Repository<Account> for SqliteStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock();
        Ok(load_accounts(&conn, "WHERE account_number = ?1", id)?
            .into_iter()
            .next())
    }

    fn find_all(&self) -> Result<Vec<Account>> {
        let conn = self.conn.lock();
        load_accounts(&conn, "", "")
    }

    fn save(&self, item: &Account) -> Result<()> {
        let conn = self.conn.lock();
        insert_account(&conn, item, false)
    }

    fn update(&self, item: &Account) -> Result<()> {
        let conn = self.conn.lock();
        update_account(&conn, item)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM accounts WHERE account_number = ?1", params![id])?;
        Ok(removed > 0)
    }
}

// ============================================================================
// CUSTOMERS
// ============================================================================

impl Repository<Customer> for SqliteStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Customer>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT customer_id, user_id, username, first_name, surname, address, phone_number, email, customer_type
                 FROM customers WHERE customer_id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        CustomerProfile {
                            first_name: row.get(3)?,
                            surname: row.get(4)?,
                            address: row.get(5)?,
                            phone_number: row.get(6)?,
                            email: row.get(7)?,
                        },
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((customer_id, user_id, username, profile, customer_type)) = row else {
            return Ok(None);
        };

        let accounts = load_accounts(&conn, "WHERE customer_id = ?1", &customer_id)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_trail WHERE user_id = ?1 ORDER BY timestamp",
            AUDIT_COLUMNS
        ))?;
        let audit = stmt
            .query_map(params![user_id], read_audit)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(into_audit)
            .collect::<Result<Vec<_>>>()?;

        let customer = Customer::restore(
            &customer_id,
            &user_id,
            &username,
            profile,
            CustomerType::from_str(&customer_type)?,
            accounts,
            audit,
        )
        .with_context(|| format!("Corrupt customer row {}", customer_id))?;
        Ok(Some(customer))
    }

    fn find_all(&self) -> Result<Vec<Customer>> {
        let ids: Vec<String> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare("SELECT customer_id FROM customers ORDER BY customer_id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let mut customers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(c) = Repository::<Customer>::find_by_id(self, &id)? {
                customers.push(c);
            }
        }
        Ok(customers)
    }

    fn save(&self, item: &Customer) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::write_customer(&tx, item, true)?;
        tx.commit()?;
        Ok(())
    }

    fn update(&self, item: &Customer) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::write_customer(&tx, item, false)?;
        tx.commit()?;
        Ok(())
    }

    /// Removes the customer and its accounts; ledger and audit rows stay
    fn delete(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM accounts WHERE customer_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM customers WHERE customer_id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}

// ============================================================================
// TRANSACTIONS (immutable)
// ============================================================================

impl Repository<Transaction> for SqliteStore {
    fn find_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE transaction_id = ?1",
                    TRANSACTION_COLUMNS
                ),
                params![id],
                read_transaction,
            )
            .optional()?;
        raw.map(into_transaction).transpose()
    }

    fn find_all(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY timestamp",
            TRANSACTION_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], read_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_transaction).collect()
    }

    fn save(&self, item: &Transaction) -> Result<()> {
        let conn = self.conn.lock();
        insert_transaction(&conn, item)
    }

    fn update(&self, item: &Transaction) -> Result<()> {
        bail!("Transaction {} is immutable", item.transaction_id)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        bail!("Transaction {} is immutable", id)
    }
}

impl TransactionLog for SqliteStore {
    fn transactions_for_account(&self, account_number: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE account_number = ?1 ORDER BY timestamp",
            TRANSACTION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![account_number], read_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_transaction).collect()
    }
}

// ============================================================================
// AUDIT TRAIL (append-only)
// ============================================================================

impl Repository<AuditEntry> for SqliteStore {
    fn find_by_id(&self, id: &str) -> Result<Option<AuditEntry>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM audit_trail WHERE audit_id = ?1", AUDIT_COLUMNS),
                params![id],
                read_audit,
            )
            .optional()?;
        raw.map(into_audit).transpose()
    }

    fn find_all(&self) -> Result<Vec<AuditEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_trail ORDER BY timestamp",
            AUDIT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], read_audit)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_audit).collect()
    }

    fn save(&self, item: &AuditEntry) -> Result<()> {
        let conn = self.conn.lock();
        insert_audit(&conn, item, false)
    }

    fn update(&self, item: &AuditEntry) -> Result<()> {
        bail!("Audit entry {} is append-only", item.audit_id)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        bail!("Audit entry {} can only be removed by the retention sweep", id)
    }
}

impl AuditRetention for SqliteStore {
    fn delete_audit_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM audit_trail WHERE timestamp < ?1",
                params![timestamp_text(cutoff)],
            )
            .context("Failed to prune audit trail")?;
        debug!(removed, cutoff = %cutoff, "pruned audit trail");
        Ok(removed)
    }

    fn audit_for_user(&self, user_id: &str) -> Result<Vec<AuditEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_trail WHERE user_id = ?1 ORDER BY timestamp",
            AUDIT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![user_id], read_audit)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_audit).collect()
    }
}

// ============================================================================
// UNIT OF WORK
// ============================================================================

impl UnitOfWork for SqliteStore {
    fn commit(&self, changes: &Changeset) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for account in &changes.accounts {
            update_account(&tx, account)?;
        }
        for record in &changes.transactions {
            insert_transaction(&tx, record)?;
        }
        for entry in &changes.audit {
            insert_audit(&tx, entry, false)?;
        }

        tx.commit().context("Failed to commit changeset")?;
        Ok(())
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

impl IdentityProvider for SqliteStore {
    fn resolve(&self, user_id: &str) -> Result<Option<Identity>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT user_id, username, role FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(user_id, username, role)| -> Result<Identity> {
            Ok(Identity {
                user_id,
                username,
                role: role.parse()?,
            })
        })
        .transpose()
    }

    fn register(&self, identity: &Identity) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (user_id, username, role) VALUES (?1, ?2, ?3)",
            params![identity.user_id, identity.username, identity.role.as_str()],
        )
        .with_context(|| format!("Failed to register identity {}", identity.user_id))?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
