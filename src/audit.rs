// 📜 Audit Ledger - append-only log keyed to known identities
//
// Entries whose actor id doesn't resolve are either dropped with a warning
// or re-attributed to the SYSTEM identity, depending on policy. Recording
// never fails the caller.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::UnknownActorPolicy;
use crate::db::SYSTEM_USER_ID;
use crate::entities::AuditEntry;
use crate::error::Result;
use crate::store::{BankStore, Repository};
use crate::temporal::{cutoff, Clock};

pub struct AuditLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: UnknownActorPolicy,
}

impl<S: BankStore> AuditLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        AuditLedger {
            store,
            clock,
            policy: UnknownActorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnknownActorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> UnknownActorPolicy {
        self.policy
    }

    /// Filter entries through the identity check
    ///
    /// Returns the entries that may be persisted, re-attributed when the
    /// policy asks for it.
    pub fn admit(&self, entries: Vec<AuditEntry>) -> Vec<AuditEntry> {
        entries
            .into_iter()
            .filter_map(|entry| self.admit_one(entry))
            .collect()
    }

    fn admit_one(&self, mut entry: AuditEntry) -> Option<AuditEntry> {
        match self.store.resolve(&entry.user_id) {
            Ok(Some(_)) => Some(entry),
            Ok(None) => match self.policy {
                UnknownActorPolicy::Drop => {
                    warn!(
                        actor = %entry.user_id,
                        action = %entry.action,
                        "dropping audit entry for unknown actor"
                    );
                    None
                }
                UnknownActorPolicy::System => {
                    debug!(actor = %entry.user_id, "re-attributing audit entry to SYSTEM");
                    entry.details = format!("[actor {}] {}", entry.user_id, entry.details);
                    entry.user_id = SYSTEM_USER_ID.to_string();
                    Some(entry)
                }
            },
            Err(err) => {
                error!(actor = %entry.user_id, "identity lookup failed, audit entry dropped: {:#}", err);
                None
            }
        }
    }

    /// Append one entry; `None` when it was dropped
    pub fn record_audit(&self, actor_id: &str, action: &str, details: &str) -> Option<AuditEntry> {
        let entry = AuditEntry::new(action, actor_id, details, self.clock.now());
        let entry = self.admit_one(entry)?;

        match Repository::<AuditEntry>::save(self.store.as_ref(), &entry) {
            Ok(()) => Some(entry),
            Err(err) => {
                error!(action, "failed to persist audit entry: {:#}", err);
                None
            }
        }
    }

    /// Retention sweep: remove entries older than `days`, returning the count
    pub fn delete_older_than(&self, days: u32) -> Result<usize> {
        let before = cutoff(self.clock.now(), days);
        let removed = self.store.delete_audit_before(before)?;
        debug!(days, removed, "audit retention sweep");
        Ok(removed)
    }

    pub fn trail_for(&self, user_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self.store.audit_for_user(user_id)?)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::actions;
    use crate::store::{Identity, IdentityProvider, Repository, Role};
    use crate::temporal::FixedClock;
    use chrono::NaiveDate;

    fn setup() -> (Arc<SqliteStore>, Arc<FixedClock>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .register(&Identity::new("CUST-001", "ada", Role::Customer))
            .unwrap();
        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        (store, clock)
    }

    fn all_entries(store: &SqliteStore) -> Vec<AuditEntry> {
        Repository::<AuditEntry>::find_all(store).unwrap()
    }

    #[test]
    fn test_known_actor_is_recorded() {
        let (store, clock) = setup();
        let ledger = AuditLedger::new(Arc::clone(&store), clock);

        let entry = ledger
            .record_audit("CUST-001", actions::DEPOSIT_SUCCESS, "Deposit of 10.00")
            .unwrap();

        let stored = all_entries(&store);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].audit_id, entry.audit_id);
        assert_eq!(stored[0].user_id, "CUST-001");
    }

    #[test]
    fn test_unknown_actor_is_dropped_silently() {
        let (store, clock) = setup();
        let ledger = AuditLedger::new(Arc::clone(&store), clock);

        let result = ledger.record_audit("nobody", actions::DEPOSIT_FAILED, "login failed");
        assert!(result.is_none());
        assert!(all_entries(&store).is_empty());
    }

    #[test]
    fn test_system_policy_reattributes_unknown_actor() {
        let (store, clock) = setup();
        let ledger =
            AuditLedger::new(Arc::clone(&store), clock).with_policy(UnknownActorPolicy::System);

        let entry = ledger
            .record_audit("nobody", actions::DEPOSIT_FAILED, "login failed")
            .unwrap();
        assert_eq!(entry.user_id, SYSTEM_USER_ID);
        assert!(entry.details.starts_with("[actor nobody]"));
        assert_eq!(all_entries(&store).len(), 1);
    }

    #[test]
    fn test_admit_filters_batch() {
        let (store, clock) = setup();
        let ledger = AuditLedger::new(store, Arc::clone(&clock) as Arc<dyn Clock>);

        let batch = vec![
            AuditEntry::new(actions::DEPOSIT, "CUST-001", "", clock.now()),
            AuditEntry::new(actions::DEPOSIT, "ghost", "", clock.now()),
        ];
        let admitted = ledger.admit(batch);
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].user_id, "CUST-001");
    }

    #[test]
    fn test_delete_older_than() {
        let (store, clock) = setup();
        let ledger = AuditLedger::new(Arc::clone(&store), Arc::clone(&clock) as Arc<dyn Clock>);

        ledger.record_audit("CUST-001", actions::DEPOSIT, "old");
        clock.advance_days(40);
        ledger.record_audit("CUST-001", actions::DEPOSIT, "recent");

        assert_eq!(ledger.delete_older_than(30).unwrap(), 1);
        let left = ledger.trail_for("CUST-001").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].details, "recent");

        assert_eq!(ledger.delete_older_than(30).unwrap(), 0);
    }
}
