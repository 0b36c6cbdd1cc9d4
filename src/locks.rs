// 🔒 Per-account locks
//
// Foreground transactions and the interest sweep both run
// load -> mutate -> commit on an account. Holding the account's lock for
// the whole cycle means neither can overwrite the other's balance.

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

type Slot = Arc<Mutex<()>>;

/// Lazily populated table of one mutex per account number
#[derive(Debug, Default)]
pub struct AccountLocks {
    table: Mutex<HashMap<String, Slot>>,
}

/// Held locks; released on drop
#[must_use = "the account is unlocked as soon as the guard is dropped"]
pub struct AccountGuard {
    _held: Vec<ArcMutexGuard<RawMutex, ()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, account_number: &str) -> Slot {
        let mut table = self.table.lock();
        Arc::clone(
            table
                .entry(account_number.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    pub fn lock(&self, account_number: &str) -> AccountGuard {
        self.lock_all(&[account_number])
    }

    /// Lock several accounts, always in sorted order so two callers
    /// locking the same pair can't deadlock
    pub fn lock_all(&self, account_numbers: &[&str]) -> AccountGuard {
        let mut numbers: Vec<&str> = account_numbers.to_vec();
        numbers.sort_unstable();
        numbers.dedup();

        let held = numbers
            .into_iter()
            .map(|n| self.slot(n).lock_arc())
            .collect();
        AccountGuard { _held: held }
    }

    /// Number of accounts that have ever been locked
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_lock_serializes_read_modify_write() {
        let locks = Arc::new(AccountLocks::new());
        let balance = Arc::new(Mutex::new(0u64));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let balance = Arc::clone(&balance);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = locks.lock("ACC1");
                        let read = *balance.lock();
                        thread::yield_now();
                        *balance.lock() = read + 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*balance.lock(), 800);
    }

    #[test]
    fn test_pair_locking_in_either_order() {
        let locks = Arc::new(AccountLocks::new());

        let a = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for _ in 0..200 {
                    let _g = locks.lock_all(&["A", "B"]);
                }
            })
        };
        let b = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for _ in 0..200 {
                    let _g = locks.lock_all(&["B", "A"]);
                }
            })
        };

        a.join().unwrap();
        b.join().unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_duplicate_numbers_lock_once() {
        let locks = AccountLocks::new();
        let _g = locks.lock_all(&["A", "A"]);
        assert_eq!(locks.len(), 1);
    }
}
