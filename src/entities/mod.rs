// Entity Models
//
// Accounts and customers carry mutable state guarded by their own rules;
// transactions and audit entries are immutable records created once.

pub mod account;
pub mod audit;
pub mod customer;
pub mod transaction;

pub use account::{
    Account, AccountKind, AccountOwner, AccountStatus, AccountType, EmploymentDetails,
    InvestmentTerms, SavingsTerms,
};
pub use audit::{actions, AuditEntry, JournalRecord};
pub use customer::{Customer, CustomerProfile, CustomerType};
pub use transaction::{Transaction, TransactionType};
