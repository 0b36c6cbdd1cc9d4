// 💸 Transaction Processor - deposit, withdrawal and transfer orchestration
//
// Every operation runs load -> mutate -> commit under the affected
// accounts' locks, and commits balances, ledger rows and the accounts' own
// audit entries as one changeset. Failures never escape as errors: they
// come back as a failed `TransactionOutcome`, and all but pure input
// validation failures also leave a `*_FAILED` audit entry.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audit::AuditLedger;
use crate::entities::{actions, Account, Transaction, TransactionType};
use crate::error::{BankError, Result};
use crate::locks::AccountLocks;
use crate::store::{BankStore, Changeset, Repository};
use crate::temporal::Clock;

// ============================================================================
// OUTCOME
// ============================================================================

/// What the caller gets back from every processor operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionOutcome {
    pub success: bool,
    /// Balance of the (source) account after the operation
    pub new_balance: Option<Decimal>,
    pub message: String,
    /// Ledger id of the (outgoing) transaction
    pub transaction_id: Option<String>,
}

impl TransactionOutcome {
    fn succeeded(message: String, new_balance: Decimal, transaction_id: String) -> Self {
        TransactionOutcome {
            success: true,
            new_balance: Some(new_balance),
            message,
            transaction_id: Some(transaction_id),
        }
    }

    fn failed(message: String) -> Self {
        TransactionOutcome {
            success: false,
            new_balance: None,
            message,
            transaction_id: None,
        }
    }
}

/// Result of a successful mutation, before it is turned into an outcome
struct Applied {
    balance: Decimal,
    transaction_id: String,
}

// ============================================================================
// PROCESSOR
// ============================================================================

pub struct TransactionProcessor<S> {
    store: Arc<S>,
    ledger: Arc<AuditLedger<S>>,
    locks: Arc<AccountLocks>,
    clock: Arc<dyn Clock>,
}

impl<S: BankStore> TransactionProcessor<S> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<AuditLedger<S>>,
        locks: Arc<AccountLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TransactionProcessor {
            store,
            ledger,
            locks,
            clock,
        }
    }

    // ------------------------------------------------------------------------
    // Deposit
    // ------------------------------------------------------------------------

    pub fn process_deposit(
        &self,
        account_number: &str,
        amount: Decimal,
        actor_id: &str,
    ) -> TransactionOutcome {
        let _guard = self.locks.lock(account_number);

        match self.try_deposit(account_number, amount) {
            Ok(applied) => {
                info!(account = account_number, %amount, balance = %applied.balance, "deposit processed");
                self.ledger.record_audit(
                    actor_id,
                    actions::DEPOSIT_SUCCESS,
                    &format!(
                        "Deposit of {:.2} to account {}. New balance: {:.2}",
                        amount, account_number, applied.balance
                    ),
                );
                TransactionOutcome::succeeded(
                    "Deposit successful".to_string(),
                    applied.balance,
                    applied.transaction_id,
                )
            }
            Err(err) => self.failure(
                actor_id,
                actions::DEPOSIT_FAILED,
                "Deposit",
                &format!("Deposit of {:.2} to account {}", amount, account_number),
                err,
            ),
        }
    }

    fn try_deposit(&self, account_number: &str, amount: Decimal) -> Result<Applied> {
        let mut account = self.load_account(account_number)?;
        let balance = account.deposit(amount)?;

        let record = Transaction::new(
            TransactionType::Deposit,
            amount,
            format!("Deposit to account {}", account_number),
            account_number,
            self.clock.now(),
        )?;
        let transaction_id = record.transaction_id.clone();

        self.commit(vec![account], vec![record])?;
        Ok(Applied {
            balance,
            transaction_id,
        })
    }

    // ------------------------------------------------------------------------
    // Withdrawal
    // ------------------------------------------------------------------------

    /// Investment accounts go through the notice-checked withdrawal
    pub fn process_withdrawal(
        &self,
        account_number: &str,
        amount: Decimal,
        actor_id: &str,
    ) -> TransactionOutcome {
        let _guard = self.locks.lock(account_number);

        match self.try_withdrawal(account_number, amount) {
            Ok(applied) => {
                info!(account = account_number, %amount, balance = %applied.balance, "withdrawal processed");
                self.ledger.record_audit(
                    actor_id,
                    actions::WITHDRAWAL_SUCCESS,
                    &format!(
                        "Withdrawal of {:.2} from account {}. New balance: {:.2}",
                        amount, account_number, applied.balance
                    ),
                );
                TransactionOutcome::succeeded(
                    "Withdrawal successful".to_string(),
                    applied.balance,
                    applied.transaction_id,
                )
            }
            Err(err) => self.failure(
                actor_id,
                actions::WITHDRAWAL_FAILED,
                "Withdrawal",
                &format!("Withdrawal of {:.2} from account {}", amount, account_number),
                err,
            ),
        }
    }

    fn try_withdrawal(&self, account_number: &str, amount: Decimal) -> Result<Applied> {
        let mut account = self.load_account(account_number)?;
        let balance = account.withdraw_on(amount, self.clock.today())?;

        let record = Transaction::new(
            TransactionType::Withdrawal,
            amount,
            format!("Withdrawal processed for account: {}", account_number),
            account_number,
            self.clock.now(),
        )?;
        let transaction_id = record.transaction_id.clone();

        self.commit(vec![account], vec![record])?;
        Ok(Applied {
            balance,
            transaction_id,
        })
    }

    // ------------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------------

    /// Both legs and both ledger rows commit together or not at all
    pub fn transfer_funds(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        actor_id: &str,
    ) -> TransactionOutcome {
        let _guard = self.locks.lock_all(&[from, to]);

        match self.try_transfer(from, to, amount) {
            Ok(applied) => {
                info!(from, to, %amount, "transfer processed");
                self.ledger.record_audit(
                    actor_id,
                    actions::TRANSFER_SUCCESS,
                    &format!("Transfer of {:.2} from account {} to {}", amount, from, to),
                );
                TransactionOutcome::succeeded(
                    "Transfer successful".to_string(),
                    applied.balance,
                    applied.transaction_id,
                )
            }
            Err(err) => self.failure(
                actor_id,
                actions::TRANSFER_FAILED,
                "Transfer",
                &format!("Transfer of {:.2} from account {} to {}", amount, from, to),
                err,
            ),
        }
    }

    fn try_transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<Applied> {
        if from == to {
            return Err(BankError::invalid_argument(
                "cannot transfer to the same account",
            ));
        }

        let mut source = self.load_account(from)?;
        let mut target = self.load_account(to)?;
        source.transfer_to_on(&mut target, amount, self.clock.today())?;

        let transfer_type = if source.customer_id() == target.customer_id() {
            TransactionType::TransferInternal
        } else {
            TransactionType::TransferExternal
        };

        let now = self.clock.now();
        let outgoing = Transaction::new(
            transfer_type,
            amount,
            format!("Transfer to account {}", to),
            from,
            now,
        )?;
        let incoming = Transaction::new(
            transfer_type,
            amount,
            format!("Transfer from account {}", from),
            to,
            now,
        )?;

        let balance = source.balance();
        let transaction_id = outgoing.transaction_id.clone();
        self.commit(vec![source, target], vec![outgoing, incoming])?;
        Ok(Applied {
            balance,
            transaction_id,
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Ledger of one account, oldest first
    pub fn transaction_history(&self, account_number: &str) -> Result<Vec<Transaction>> {
        self.load_account(account_number)?;
        Ok(self.store.transactions_for_account(account_number)?)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn load_account(&self, account_number: &str) -> Result<Account> {
        if account_number.trim().is_empty() {
            return Err(BankError::invalid_argument("account number cannot be empty"));
        }
        Repository::<Account>::find_by_id(self.store.as_ref(), account_number)?
            .ok_or_else(|| BankError::NotFound(format!("account {}", account_number)))
    }

    fn commit(&self, mut accounts: Vec<Account>, transactions: Vec<Transaction>) -> Result<()> {
        let now = self.clock.now();
        let journal = accounts
            .iter_mut()
            .flat_map(|a| a.drain_journal(now))
            .collect();

        let changes = Changeset {
            accounts,
            transactions,
            audit: self.ledger.admit(journal),
        };
        self.store.commit(&changes)?;
        Ok(())
    }

    fn failure(
        &self,
        actor_id: &str,
        failed_action: &str,
        operation: &str,
        attempted: &str,
        err: BankError,
    ) -> TransactionOutcome {
        match &err {
            BankError::InvalidArgument(_) => {
                warn!(actor = actor_id, "{} rejected: {}", operation, err);
                return TransactionOutcome::failed(err.to_string());
            }
            BankError::Persistence(msg) => {
                error!(actor = actor_id, "{} failed: {}", operation, msg);
                self.ledger.record_audit(
                    actor_id,
                    failed_action,
                    &format!("{} failed: {}", attempted, msg),
                );
                return TransactionOutcome::failed(format!("{} failed: {}", operation, msg));
            }
            BankError::InvalidState(_) | BankError::BusinessRule(_) | BankError::NotFound(_) => {
                warn!(actor = actor_id, "{} refused: {}", operation, err);
            }
        }

        self.ledger.record_audit(
            actor_id,
            failed_action,
            &format!("{} failed: {}", attempted, err),
        );
        TransactionOutcome::failed(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::{AccountKind, AccountOwner, AccountStatus, AuditEntry};
    use crate::store::{AuditRetention, Identity, IdentityProvider, Role, TransactionLog};
    use crate::temporal::{cutoff, FixedClock};
    use chrono::{Duration, NaiveDate};
    use rust_decimal_macros::dec;

    struct Bank {
        store: Arc<SqliteStore>,
        clock: Arc<FixedClock>,
        processor: TransactionProcessor<SqliteStore>,
    }

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn bank() -> Bank {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for (id, name) in [("CUST-001", "ada"), ("CUST-002", "alan")] {
            store
                .register(&Identity::new(id, name, Role::Customer))
                .unwrap();
        }
        let clock = Arc::new(FixedClock::on(day0()));
        let ledger = Arc::new(AuditLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let processor = TransactionProcessor::new(
            Arc::clone(&store),
            ledger,
            Arc::new(AccountLocks::new()),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Bank {
            store,
            clock,
            processor,
        }
    }

    fn open(bank: &Bank, number: &str, kind: AccountKind, balance: Decimal, owner: &str) {
        let account = Account::open(
            number,
            kind,
            balance,
            AccountOwner::new(owner, owner),
            bank.clock.today(),
        )
        .unwrap();
        Repository::<Account>::save(bank.store.as_ref(), &account).unwrap();
    }

    fn cheque() -> AccountKind {
        AccountKind::cheque("Acme", "1 Main St", true)
    }

    fn balance(bank: &Bank, number: &str) -> Decimal {
        let account = Repository::<Account>::find_by_id(bank.store.as_ref(), number)
            .unwrap()
            .unwrap();
        account.balance()
    }

    fn audit_actions(bank: &Bank, user: &str) -> Vec<String> {
        bank.store
            .audit_for_user(user)
            .unwrap()
            .into_iter()
            .map(|e: AuditEntry| e.action)
            .collect()
    }

    #[test]
    fn test_deposit_success() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(100), "CUST-001");

        let outcome = bank.processor.process_deposit("CHQ1", dec!(50), "CUST-001");
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.new_balance, Some(dec!(150)));
        assert_eq!(balance(&bank, "CHQ1"), dec!(150));

        let ledger = bank.store.transactions_for_account("CHQ1").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(Some(ledger[0].transaction_id.clone()), outcome.transaction_id);
        assert_eq!(ledger[0].transaction_type, TransactionType::Deposit);

        let actions_seen = audit_actions(&bank, "CUST-001");
        assert!(actions_seen.contains(&"DEPOSIT".to_string()));
        assert!(actions_seen.contains(&"DEPOSIT_SUCCESS".to_string()));
    }

    #[test]
    fn test_deposit_unknown_account_is_audited_failure() {
        let bank = bank();
        let outcome = bank.processor.process_deposit("NOPE", dec!(50), "CUST-001");

        assert!(!outcome.success);
        assert!(outcome.message.contains("Not found"));
        assert_eq!(audit_actions(&bank, "CUST-001"), vec!["DEPOSIT_FAILED"]);
    }

    #[test]
    fn test_invalid_amount_is_silent_failure() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(100), "CUST-001");

        let outcome = bank.processor.process_deposit("CHQ1", dec!(-5), "CUST-001");
        assert!(!outcome.success);
        assert!(audit_actions(&bank, "CUST-001").is_empty());
        assert_eq!(balance(&bank, "CHQ1"), dec!(100));
    }

    #[test]
    fn test_deposit_to_suspended_account_fails() {
        let bank = bank();
        let mut account = Account::open(
            "CHQ1",
            cheque(),
            dec!(100),
            AccountOwner::new("CUST-001", "CUST-001"),
            day0(),
        )
        .unwrap();
        account.update_status(AccountStatus::Suspended).unwrap();
        Repository::<Account>::save(bank.store.as_ref(), &account).unwrap();

        let outcome = bank.processor.process_deposit("CHQ1", dec!(5), "CUST-001");
        assert!(!outcome.success);
        assert!(outcome.message.contains("Invalid state"));
        assert_eq!(audit_actions(&bank, "CUST-001"), vec!["DEPOSIT_FAILED"]);
    }

    #[test]
    fn test_cheque_withdrawal() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(800.00), "CUST-001");

        let outcome = bank.processor.process_withdrawal("CHQ1", dec!(200.00), "CUST-001");
        assert!(outcome.success);
        assert_eq!(outcome.new_balance, Some(dec!(600.00)));

        let ledger = bank.store.transactions_for_account("CHQ1").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].transaction_type, TransactionType::Withdrawal);
        assert_eq!(ledger[0].amount, dec!(200.00));

        let success = audit_actions(&bank, "CUST-001")
            .into_iter()
            .filter(|a| a == "WITHDRAWAL_SUCCESS")
            .count();
        assert_eq!(success, 1);
    }

    #[test]
    fn test_savings_withdrawal_refused() {
        let bank = bank();
        open(
            &bank,
            "SAV1",
            AccountKind::savings(dec!(0.025), dec!(500), day0()),
            dec!(5000),
            "CUST-001",
        );

        let outcome = bank.processor.process_withdrawal("SAV1", dec!(10), "CUST-001");
        assert!(!outcome.success);
        assert_eq!(audit_actions(&bank, "CUST-001"), vec!["WITHDRAWAL_FAILED"]);
        assert_eq!(balance(&bank, "SAV1"), dec!(5000));
    }

    #[test]
    fn test_investment_withdrawal_waits_for_notice() {
        let bank = bank();
        open(
            &bank,
            "INV1",
            AccountKind::investment(dec!(0.065), day0()),
            dec!(2000),
            "CUST-001",
        );

        bank.clock.advance_days(10);
        let early = bank.processor.process_withdrawal("INV1", dec!(100), "CUST-001");
        assert!(!early.success);
        assert!(early.message.contains("notice"));

        bank.clock.advance_days(20);
        let ok = bank.processor.process_withdrawal("INV1", dec!(100), "CUST-001");
        assert!(ok.success, "{}", ok.message);
        assert_eq!(balance(&bank, "INV1"), dec!(1900));
    }

    #[test]
    fn test_internal_transfer_records_both_legs() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(1000.00), "CUST-001");
        open(
            &bank,
            "SAV1",
            AccountKind::savings(dec!(0.025), dec!(500), day0()),
            dec!(500.00),
            "CUST-001",
        );

        let outcome = bank
            .processor
            .transfer_funds("CHQ1", "SAV1", dec!(300.00), "CUST-001");
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.new_balance, Some(dec!(700.00)));
        assert_eq!(balance(&bank, "CHQ1"), dec!(700.00));
        assert_eq!(balance(&bank, "SAV1"), dec!(800.00));

        let out = bank.store.transactions_for_account("CHQ1").unwrap();
        let inc = bank.store.transactions_for_account("SAV1").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(inc.len(), 1);
        assert_eq!(out[0].transaction_type, TransactionType::TransferInternal);
        assert_eq!(inc[0].transaction_type, TransactionType::TransferInternal);
    }

    #[test]
    fn test_transfer_between_customers_is_external() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(1000), "CUST-001");
        open(&bank, "CHQ2", cheque(), dec!(0), "CUST-002");

        let outcome = bank
            .processor
            .transfer_funds("CHQ1", "CHQ2", dec!(250), "CUST-001");
        assert!(outcome.success);

        let inc = bank.store.transactions_for_account("CHQ2").unwrap();
        assert_eq!(inc[0].transaction_type, TransactionType::TransferExternal);

        // the receiving account's deposit is attributed to its own owner
        assert!(audit_actions(&bank, "CUST-002").contains(&"DEPOSIT".to_string()));
    }

    #[test]
    fn test_failed_transfer_changes_nothing() {
        let bank = bank();
        open(
            &bank,
            "SAV1",
            AccountKind::savings(dec!(0.025), dec!(500), day0()),
            dec!(1000),
            "CUST-001",
        );
        open(&bank, "CHQ1", cheque(), dec!(0), "CUST-001");

        let outcome = bank
            .processor
            .transfer_funds("SAV1", "CHQ1", dec!(501), "CUST-001");
        assert!(!outcome.success);
        assert_eq!(balance(&bank, "SAV1"), dec!(1000));
        assert_eq!(balance(&bank, "CHQ1"), dec!(0));
        assert!(bank.store.transactions_for_account("SAV1").unwrap().is_empty());
        assert_eq!(audit_actions(&bank, "CUST-001"), vec!["TRANSFER_FAILED"]);

        let same = bank
            .processor
            .transfer_funds("CHQ1", "CHQ1", dec!(1), "CUST-001");
        assert!(!same.success);
    }

    #[test]
    fn test_persistence_failure_is_generic_failure() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(100), "CUST-001");
        bank.store
            .with_connection(|conn| conn.execute_batch("DROP TABLE transactions"))
            .unwrap();

        let outcome = bank.processor.process_deposit("CHQ1", dec!(10), "CUST-001");
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Deposit failed:"));

        // balance update rolled back with the failed ledger insert
        assert_eq!(balance(&bank, "CHQ1"), dec!(100));
        assert_eq!(audit_actions(&bank, "CUST-001"), vec!["DEPOSIT_FAILED"]);
    }

    #[test]
    fn test_audit_entries_carry_clock_time_and_age_out() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(100), "CUST-001");

        let outcome = bank.processor.process_deposit("CHQ1", dec!(10), "CUST-001");
        assert!(outcome.success, "{}", outcome.message);

        let trail = bank.store.audit_for_user("CUST-001").unwrap();
        assert_eq!(trail.len(), 2);
        assert!(trail.iter().all(|e| e.timestamp == bank.clock.now()));

        bank.clock.advance_days(400);
        let removed = bank
            .store
            .delete_audit_before(cutoff(bank.clock.now(), 365))
            .unwrap();
        assert_eq!(removed, 2);
        assert!(audit_actions(&bank, "CUST-001").is_empty());
    }

    #[test]
    fn test_transaction_history() {
        let bank = bank();
        open(&bank, "CHQ1", cheque(), dec!(100), "CUST-001");

        bank.processor.process_deposit("CHQ1", dec!(1), "CUST-001");
        bank.clock.set(bank.clock.now() + Duration::minutes(5));
        bank.processor.process_withdrawal("CHQ1", dec!(2), "CUST-001");

        let history = bank.processor.transaction_history("CHQ1").unwrap();
        let kinds: Vec<_> = history.iter().map(|t| t.transaction_type).collect();
        assert_eq!(kinds, vec![TransactionType::Deposit, TransactionType::Withdrawal]);

        assert!(matches!(
            bank.processor.transaction_history("NOPE"),
            Err(BankError::NotFound(_))
        ));
    }
}
