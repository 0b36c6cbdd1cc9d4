// 🔢 Id Generation
// Prefixed, zero-padded sequential ids per role plus random record ids.
//
// Formats:
//   CUST-001, BE-001, ADM-001   sequential per role, resumed from the store
//   ACC1718000000123            millisecond stamp, strictly increasing
//   TXN_<uuid>, AUDIT_<uuid>    random, for ledger and audit records

use chrono::Utc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use uuid::Uuid;

pub const CUSTOMER_PREFIX: &str = "CUST-";
pub const EMPLOYEE_PREFIX: &str = "BE-";
pub const ADMIN_PREFIX: &str = "ADM-";
pub const ACCOUNT_PREFIX: &str = "ACC";

/// Fresh transaction id
pub fn transaction_id() -> String {
    format!("TXN_{}", Uuid::new_v4().simple())
}

/// Fresh audit entry id
pub fn audit_id() -> String {
    format!("AUDIT_{}", Uuid::new_v4().simple())
}

/// Concurrency-safe issuer of sequential ids
#[derive(Debug, Default)]
pub struct IdGenerator {
    customers: AtomicU32,
    employees: AtomicU32,
    admins: AtomicU32,
    last_account_millis: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume every counter from the highest suffix among `existing`
    ///
    /// Ids that don't match a known prefix are ignored.
    pub fn seeded<'a>(existing: impl IntoIterator<Item = &'a str>) -> Self {
        let generator = Self::new();
        for id in existing {
            if let Some(n) = suffix(id, CUSTOMER_PREFIX) {
                generator.customers.fetch_max(n, Ordering::SeqCst);
            } else if let Some(n) = suffix(id, EMPLOYEE_PREFIX) {
                generator.employees.fetch_max(n, Ordering::SeqCst);
            } else if let Some(n) = suffix(id, ADMIN_PREFIX) {
                generator.admins.fetch_max(n, Ordering::SeqCst);
            } else if let Some(millis) = id
                .strip_prefix(ACCOUNT_PREFIX)
                .and_then(|rest| rest.parse::<u64>().ok())
            {
                generator
                    .last_account_millis
                    .fetch_max(millis, Ordering::SeqCst);
            }
        }
        generator
    }

    pub fn next_customer_id(&self) -> String {
        next_sequential(&self.customers, CUSTOMER_PREFIX)
    }

    pub fn next_employee_id(&self) -> String {
        next_sequential(&self.employees, EMPLOYEE_PREFIX)
    }

    pub fn next_admin_id(&self) -> String {
        next_sequential(&self.admins, ADMIN_PREFIX)
    }

    /// `ACC<millis>`, bumped past the previous number when issued in the same millisecond
    pub fn next_account_number(&self) -> String {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut last = self.last_account_millis.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self.last_account_millis.compare_exchange(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return format!("{}{}", ACCOUNT_PREFIX, candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

fn next_sequential(counter: &AtomicU32, prefix: &str) -> String {
    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
    format!("{}{:03}", prefix, n)
}

fn suffix(id: &str, prefix: &str) -> Option<u32> {
    id.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequential_formats() {
        let ids = IdGenerator::new();
        assert_eq!(ids.next_customer_id(), "CUST-001");
        assert_eq!(ids.next_customer_id(), "CUST-002");
        assert_eq!(ids.next_employee_id(), "BE-001");
        assert_eq!(ids.next_admin_id(), "ADM-001");
    }

    #[test]
    fn test_seeded_resumes_from_max() {
        let ids = IdGenerator::seeded(["CUST-007", "CUST-003", "BE-012", "someone", "ADM-x"]);
        assert_eq!(ids.next_customer_id(), "CUST-008");
        assert_eq!(ids.next_employee_id(), "BE-013");
        assert_eq!(ids.next_admin_id(), "ADM-001");
    }

    #[test]
    fn test_account_numbers_strictly_increase() {
        let ids = IdGenerator::seeded(["ACC99999999999999"]);
        let a = ids.next_account_number();
        let b = ids.next_account_number();
        assert_eq!(a, "ACC100000000000000");
        assert_eq!(b, "ACC100000000000001");
    }

    #[test]
    fn test_concurrent_customer_ids_unique() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    (0..50)
                        .map(|_| (ids.next_customer_id(), ids.next_account_number()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut customers = HashSet::new();
        let mut accounts = HashSet::new();
        for h in handles {
            for (c, a) in h.join().unwrap() {
                assert!(customers.insert(c));
                assert!(accounts.insert(a));
            }
        }
        assert_eq!(customers.len(), 400);
    }

    #[test]
    fn test_record_id_prefixes() {
        assert!(transaction_id().starts_with("TXN_"));
        assert!(audit_id().starts_with("AUDIT_"));
        assert_ne!(audit_id(), audit_id());
    }
}
