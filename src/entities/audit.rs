// 📜 Audit Entry - immutable record of a business-significant action
//
// Entries are never edited. The only way one disappears is the retention
// sweep in `AuditLedger::delete_older_than`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;

/// Well-known action codes
///
/// The code column is free-form; these are the ones the engine emits.
pub mod actions {
    pub const DEPOSIT: &str = "DEPOSIT";
    pub const WITHDRAWAL: &str = "WITHDRAWAL";
    pub const TRANSFER_OUT: &str = "TRANSFER_OUT";
    pub const INTEREST_APPLIED: &str = "INTEREST_APPLIED";
    pub const STATUS_CHANGED: &str = "STATUS_CHANGED";
    pub const ACCOUNT_CREATED: &str = "ACCOUNT_CREATED";
    pub const PROFILE_UPDATED: &str = "PROFILE_UPDATED";

    pub const DEPOSIT_SUCCESS: &str = "DEPOSIT_SUCCESS";
    pub const DEPOSIT_FAILED: &str = "DEPOSIT_FAILED";
    pub const WITHDRAWAL_SUCCESS: &str = "WITHDRAWAL_SUCCESS";
    pub const WITHDRAWAL_FAILED: &str = "WITHDRAWAL_FAILED";
    pub const TRANSFER_SUCCESS: &str = "TRANSFER_SUCCESS";
    pub const TRANSFER_FAILED: &str = "TRANSFER_FAILED";

    pub const CUSTOMER_CREATED: &str = "CUSTOMER_CREATED";
    pub const CUSTOMER_DELETED: &str = "CUSTOMER_DELETED";
    pub const ACCOUNT_OPENED: &str = "ACCOUNT_OPENED";
    pub const ACCOUNT_CLOSED: &str = "ACCOUNT_CLOSED";
    pub const ACCOUNT_CLOSURE_FAILED: &str = "ACCOUNT_CLOSURE_FAILED";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    /// Actor identity
    pub user_id: String,
    pub details: String,
}

impl AuditEntry {
    /// New entry with a fresh id
    pub fn new(action: &str, user_id: &str, details: impl Into<String>, at: DateTime<Utc>) -> Self {
        AuditEntry {
            audit_id: ids::audit_id(),
            action: action.to_string(),
            timestamp: at,
            user_id: user_id.to_string(),
            details: details.into(),
        }
    }

    /// True when the entry was written before `cutoff`
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp < cutoff
    }
}

/// An action an entity journaled but nobody has timestamped yet
///
/// Entities have no clock; the service that persists them stamps each
/// record with its own `Clock::now()` when it drains the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub action: String,
    pub user_id: String,
    pub details: String,
}

impl JournalRecord {
    pub fn new(action: &str, user_id: &str, details: impl Into<String>) -> Self {
        JournalRecord {
            action: action.to_string(),
            user_id: user_id.to_string(),
            details: details.into(),
        }
    }

    pub fn stamp(self, at: DateTime<Utc>) -> AuditEntry {
        AuditEntry::new(&self.action, &self.user_id, self.details, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_audit_entry_creation() {
        let now = Utc::now();
        let entry = AuditEntry::new(actions::DEPOSIT_SUCCESS, "CUST-001", "Deposit of 10.00", now);

        assert!(entry.audit_id.starts_with("AUDIT_"));
        assert_eq!(entry.action, "DEPOSIT_SUCCESS");
        assert_eq!(entry.user_id, "CUST-001");
        assert_eq!(entry.timestamp, now);
    }

    #[test]
    fn test_audit_ids_are_unique() {
        let now = Utc::now();
        let a = AuditEntry::new(actions::DEPOSIT, "u", "", now);
        let b = AuditEntry::new(actions::DEPOSIT, "u", "", now);
        assert_ne!(a.audit_id, b.audit_id);
    }

    #[test]
    fn test_is_older_than() {
        let now = Utc::now();
        let entry = AuditEntry::new(actions::DEPOSIT, "u", "", now - Duration::days(40));

        assert!(entry.is_older_than(now - Duration::days(30)));
        assert!(!entry.is_older_than(now - Duration::days(50)));
    }
}
