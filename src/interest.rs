// ⏳ Interest Accrual Scheduler
//
// One sweep walks every account, applies interest to the interest-bearing
// ones and commits each credit with its INTEREST_PAYMENT ledger row. Each
// account is handled under its lock, so a sweep and a foreground
// transaction can't lose each other's balance update.

use anyhow::{ensure, Context};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::audit::AuditLedger;
use crate::entities::{Account, Transaction, TransactionType};
use crate::error::{BankError, Result};
use crate::locks::AccountLocks;
use crate::store::{BankStore, Changeset, Repository};
use crate::temporal::Clock;

/// Totals for one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Interest-bearing accounts looked at
    pub examined: usize,
    pub credited: usize,
    pub failed: usize,
    pub total_interest: Decimal,
}

pub struct InterestAccrualScheduler<S> {
    store: Arc<S>,
    ledger: Arc<AuditLedger<S>>,
    locks: Arc<AccountLocks>,
    clock: Arc<dyn Clock>,
}

impl<S: BankStore + 'static> InterestAccrualScheduler<S> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<AuditLedger<S>>,
        locks: Arc<AccountLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        InterestAccrualScheduler {
            store,
            ledger,
            locks,
            clock,
        }
    }

    /// Apply interest to every interest-bearing account once
    ///
    /// A failure on one account is logged and counted; the sweep carries on.
    pub fn sweep(&self) -> Result<SweepReport> {
        let accounts = Repository::<Account>::find_all(self.store.as_ref())?;
        let mut report = SweepReport::default();

        for account in accounts.iter().filter(|a| a.is_interest_bearing()) {
            report.examined += 1;
            match self.accrue(account.account_number()) {
                Ok(Some(interest)) => {
                    report.credited += 1;
                    report.total_interest += interest;
                }
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(account = account.account_number(), "interest not applied: {}", err);
                }
            }
        }

        info!(
            examined = report.examined,
            credited = report.credited,
            failed = report.failed,
            total = %report.total_interest,
            "interest sweep finished"
        );
        Ok(report)
    }

    fn accrue(&self, account_number: &str) -> Result<Option<Decimal>> {
        let _guard = self.locks.lock(account_number);

        // re-read under the lock; the listing may be stale
        let Some(mut account) =
            Repository::<Account>::find_by_id(self.store.as_ref(), account_number)?
        else {
            return Ok(None);
        };

        let interest = account.apply_interest_on(self.clock.today())?;
        if interest.is_zero() {
            return Ok(None);
        }

        let record = Transaction::new(
            TransactionType::InterestPayment,
            interest,
            format!("Interest payment for account {}", account_number),
            account_number,
            self.clock.now(),
        )?;

        let changes = Changeset {
            audit: self.ledger.admit(account.drain_journal(self.clock.now())),
            accounts: vec![account],
            transactions: vec![record],
        };
        self.store.commit(&changes).map_err(BankError::from)?;

        debug!(account = account_number, %interest, "interest credited");
        Ok(Some(interest))
    }

    /// Run a sweep now and then every `interval` on a background thread
    pub fn start(self: Arc<Self>, interval: Duration) -> anyhow::Result<SchedulerHandle> {
        ensure!(!interval.is_zero(), "sweep interval must be greater than zero");
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("interest-accrual".to_string())
            .spawn(move || loop {
                if let Err(err) = self.sweep() {
                    error!("interest sweep failed: {}", err);
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .context("Failed to spawn interest accrual thread")?;

        info!(interval_secs = interval.as_secs(), "interest scheduler started");
        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Stops future sweeps when stopped or dropped; a sweep in progress finishes
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("interest accrual thread panicked");
            }
            info!("interest scheduler stopped");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::{AccountKind, AccountOwner};
    use crate::store::{Identity, IdentityProvider, Role, TransactionLog};
    use crate::temporal::FixedClock;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::time::Instant;

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn setup() -> (Arc<SqliteStore>, Arc<FixedClock>, Arc<InterestAccrualScheduler<SqliteStore>>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .register(&Identity::new("CUST-001", "ada", Role::Customer))
            .unwrap();
        let clock = Arc::new(FixedClock::on(day0()));
        let ledger = Arc::new(AuditLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let scheduler = Arc::new(InterestAccrualScheduler::new(
            Arc::clone(&store),
            ledger,
            Arc::new(AccountLocks::new()),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));

        let owner = AccountOwner::new("CUST-001", "CUST-001");
        let accounts = [
            (
                "SAV1",
                AccountKind::savings(dec!(0.025), dec!(500), day0()),
                dec!(1000.00),
            ),
            ("INV1", AccountKind::investment(dec!(0.065), day0()), dec!(10000)),
            ("CHQ1", AccountKind::cheque("Acme", "", true), dec!(1000)),
        ];
        for (number, kind, balance) in accounts {
            let account = Account::open(number, kind, balance, owner.clone(), day0()).unwrap();
            Repository::<Account>::save(store.as_ref(), &account).unwrap();
        }

        (store, clock, scheduler)
    }

    fn balance(store: &SqliteStore, number: &str) -> Decimal {
        let account = Repository::<Account>::find_by_id(store, number).unwrap().unwrap();
        account.balance()
    }

    #[test]
    fn test_sweep_before_period_credits_nothing() {
        let (store, clock, scheduler) = setup();
        clock.advance_days(29);

        let report = scheduler.sweep().unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.credited, 0);
        assert_eq!(balance(&store, "SAV1"), dec!(1000.00));
    }

    #[test]
    fn test_sweep_credits_due_savings_only() {
        let (store, clock, scheduler) = setup();
        clock.advance_days(31);

        let report = scheduler.sweep().unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.credited, 1);
        assert_eq!(report.total_interest, dec!(2.12));
        assert_eq!(balance(&store, "SAV1"), dec!(1002.12));
        assert_eq!(balance(&store, "INV1"), dec!(10000));
        assert_eq!(balance(&store, "CHQ1"), dec!(1000));

        let ledger = store.transactions_for_account("SAV1").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].transaction_type, TransactionType::InterestPayment);
        assert_eq!(ledger[0].amount, dec!(2.12));

        // window restarted: a second sweep the same day does nothing
        let again = scheduler.sweep().unwrap();
        assert_eq!(again.credited, 0);
    }

    #[test]
    fn test_sweep_counts_failures_and_continues() {
        let (store, clock, scheduler) = setup();
        clock.advance_days(120);
        store
            .with_connection(|conn| conn.execute_batch("DROP TABLE transactions"))
            .unwrap();

        let report = scheduler.sweep().unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.credited, 0);
        assert_eq!(balance(&store, "SAV1"), dec!(1000.00));
    }

    #[test]
    fn test_started_scheduler_sweeps_immediately_and_stops() {
        let (store, clock, scheduler) = setup();
        clock.advance_days(31);

        let handle = Arc::clone(&scheduler)
            .start(Duration::from_secs(3600))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while balance(&store, "SAV1") == dec!(1000.00) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();

        assert_eq!(balance(&store, "SAV1"), dec!(1002.12));
    }

    #[test]
    fn test_start_rejects_zero_interval() {
        let (store, clock, scheduler) = setup();
        clock.advance_days(31);

        match Arc::clone(&scheduler).start(Duration::ZERO) {
            Ok(_) => panic!("zero interval accepted"),
            Err(err) => assert!(err.to_string().contains("greater than zero")),
        }
        assert_eq!(balance(&store, "SAV1"), dec!(1000.00));
    }
}
