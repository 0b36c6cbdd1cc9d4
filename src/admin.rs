// 🏦 Account Administration - customer and account lifecycle actions
//
// Creates customers (with their identity), opens and closes accounts,
// updates profiles, suspends and deletes customers. Each customer is
// persisted as a whole: row, accounts and audit trail.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::AuditLedger;
use crate::config::BankConfig;
use crate::entities::account::{
    INVESTMENT_DEFAULT_RATE, INVESTMENT_MINIMUM_INITIAL_DEPOSIT, SAVINGS_DEFAULT_MINIMUM_BALANCE,
    SAVINGS_DEFAULT_RATE,
};
use crate::entities::{
    actions, Account, AccountKind, AccountStatus, Customer, CustomerProfile, CustomerType,
    InvestmentTerms,
};
use crate::error::{BankError, BusinessRule, Result};
use crate::ids::IdGenerator;
use crate::locks::{AccountGuard, AccountLocks};
use crate::store::{BankStore, Identity, Repository, Role};
use crate::temporal::Clock;

/// Terms applied to newly opened accounts
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTerms {
    pub savings_rate: Decimal,
    pub savings_minimum_balance: Decimal,
    pub investment_rate: Decimal,
}

impl Default for ProductTerms {
    fn default() -> Self {
        ProductTerms {
            savings_rate: SAVINGS_DEFAULT_RATE,
            savings_minimum_balance: SAVINGS_DEFAULT_MINIMUM_BALANCE,
            investment_rate: INVESTMENT_DEFAULT_RATE,
        }
    }
}

impl From<&BankConfig> for ProductTerms {
    fn from(config: &BankConfig) -> Self {
        ProductTerms {
            savings_rate: config.interest.savings_rate,
            savings_minimum_balance: config.accounts.savings_minimum_balance,
            investment_rate: config.interest.investment_rate,
        }
    }
}

/// Which kind of account to open
#[derive(Debug, Clone, PartialEq)]
pub enum AccountProduct {
    Savings,
    Investment,
    Cheque {
        employer_name: String,
        employer_address: String,
        employed: bool,
    },
}

pub struct AccountAdministration<S> {
    store: Arc<S>,
    ledger: Arc<AuditLedger<S>>,
    ids: Arc<IdGenerator>,
    locks: Arc<AccountLocks>,
    clock: Arc<dyn Clock>,
    terms: ProductTerms,
}

impl<S: BankStore> AccountAdministration<S> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<AuditLedger<S>>,
        ids: Arc<IdGenerator>,
        locks: Arc<AccountLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        AccountAdministration {
            store,
            ledger,
            ids,
            locks,
            clock,
            terms: ProductTerms::default(),
        }
    }

    pub fn with_terms(mut self, terms: ProductTerms) -> Self {
        self.terms = terms;
        self
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    pub fn register_identity(&self, identity: &Identity) -> Result<()> {
        if identity.user_id.trim().is_empty() || identity.username.trim().is_empty() {
            return Err(BankError::invalid_argument(
                "identity needs a user id and a username",
            ));
        }
        self.store.register(identity)?;
        info!(user = %identity.user_id, role = identity.role.as_str(), "identity registered");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Customers
    // ------------------------------------------------------------------------

    pub fn find_customer(&self, customer_id: &str) -> Result<Customer> {
        Repository::<Customer>::find_by_id(self.store.as_ref(), customer_id)?
            .ok_or_else(|| BankError::NotFound(format!("customer {}", customer_id)))
    }

    /// Load a customer with every account it owns locked
    ///
    /// A customer write rewrites all of its accounts, so none of them may
    /// move while the aggregate is held.
    fn lock_customer(&self, customer_id: &str) -> Result<(AccountGuard, Customer)> {
        let numbers = self.find_customer(customer_id)?.account_numbers();
        let refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
        let guard = self.locks.lock_all(&refs);

        let customer = self.find_customer(customer_id)?;
        Ok((guard, customer))
    }

    /// New customer under the next `CUST-###` id, which doubles as its user id
    pub fn create_customer(
        &self,
        username: &str,
        profile: CustomerProfile,
        customer_type: CustomerType,
        actor_id: &str,
    ) -> Result<Customer> {
        let customer_id = self.ids.next_customer_id();
        let customer = Customer::new(&customer_id, &customer_id, username, profile, customer_type)?;

        Repository::<Customer>::save(self.store.as_ref(), &customer)?;
        let identity = Identity::new(&customer_id, username, Role::Customer);
        if let Err(err) = self.register_identity(&identity) {
            Repository::<Customer>::delete(self.store.as_ref(), &customer_id)?;
            warn!(customer = %customer_id, "customer rolled back: {}", err);
            return Err(err);
        }

        self.ledger.record_audit(
            actor_id,
            actions::CUSTOMER_CREATED,
            &format!(
                "Customer {} ({}) created for {}",
                customer_id,
                customer_type.as_str(),
                customer.profile().full_name()
            ),
        );
        info!(customer = %customer_id, "customer created");
        Ok(customer)
    }

    pub fn update_customer_profile(
        &self,
        customer_id: &str,
        profile: CustomerProfile,
        actor_id: &str,
    ) -> Result<Customer> {
        let (_guard, mut customer) = self.lock_customer(customer_id)?;
        customer.update_profile(profile, self.clock.now())?;
        Repository::<Customer>::update(self.store.as_ref(), &customer)?;

        if actor_id != customer.user_id() {
            self.ledger.record_audit(
                actor_id,
                actions::PROFILE_UPDATED,
                &format!("Profile of customer {} updated", customer_id),
            );
        }
        Ok(customer)
    }

    /// Suspend every account that isn't closed; returns how many changed
    pub fn suspend_customer(&self, customer_id: &str, actor_id: &str) -> Result<usize> {
        let (_guard, mut customer) = self.lock_customer(customer_id)?;
        let now = self.clock.now();
        let mut suspended = 0;
        for number in customer.account_numbers() {
            let changed = customer.with_account(&number, now, |account| {
                if matches!(
                    account.status(),
                    AccountStatus::Closed | AccountStatus::Suspended
                ) {
                    return Ok(false);
                }
                account.update_status(AccountStatus::Suspended)?;
                Ok(true)
            })?;
            if changed {
                suspended += 1;
            }
        }
        Repository::<Customer>::update(self.store.as_ref(), &customer)?;

        self.ledger.record_audit(
            actor_id,
            actions::STATUS_CHANGED,
            &format!(
                "Customer {} suspended ({} accounts)",
                customer_id, suspended
            ),
        );
        warn!(customer = customer_id, suspended, "customer suspended");
        Ok(suspended)
    }

    /// Refused while any account holds money or is not closed
    pub fn delete_customer(&self, customer_id: &str, actor_id: &str) -> Result<()> {
        let (_guard, customer) = self.lock_customer(customer_id)?;
        if !customer.can_be_deleted() {
            return Err(BankError::invalid_state(format!(
                "customer {} still has open or funded accounts",
                customer_id
            )));
        }

        Repository::<Customer>::delete(self.store.as_ref(), customer_id)?;
        self.ledger.record_audit(
            actor_id,
            actions::CUSTOMER_DELETED,
            &format!("Customer {} deleted", customer_id),
        );
        info!(customer = customer_id, "customer deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------------

    pub fn open_account(
        &self,
        customer_id: &str,
        product: AccountProduct,
        initial_deposit: Decimal,
        actor_id: &str,
    ) -> Result<Account> {
        if initial_deposit < Decimal::ZERO {
            return Err(BankError::invalid_argument(
                "initial deposit cannot be negative",
            ));
        }
        let (_guard, mut customer) = self.lock_customer(customer_id)?;

        let today = self.clock.today();
        let kind = match product {
            AccountProduct::Savings => AccountKind::savings(
                self.terms.savings_rate,
                self.terms.savings_minimum_balance,
                today,
            ),
            AccountProduct::Investment => {
                if !InvestmentTerms::validate_initial_deposit(initial_deposit) {
                    return Err(BusinessRule::InitialDeposit {
                        minimum: INVESTMENT_MINIMUM_INITIAL_DEPOSIT,
                    }
                    .into());
                }
                AccountKind::investment(self.terms.investment_rate, today)
            }
            AccountProduct::Cheque {
                employer_name,
                employer_address,
                employed,
            } => AccountKind::cheque(&employer_name, &employer_address, employed),
        };

        let number = self.ids.next_account_number();
        let account = Account::open(&number, kind, initial_deposit, customer.owner(), today)?;
        customer.add_account(account, self.clock.now())?;
        Repository::<Customer>::update(self.store.as_ref(), &customer)?;

        let opened = customer
            .find_account(&number)
            .cloned()
            .ok_or_else(|| BankError::NotFound(format!("account {}", number)))?;

        self.ledger.record_audit(
            actor_id,
            actions::ACCOUNT_OPENED,
            &format!(
                "{} account {} opened for customer {} with {:.2}",
                opened.account_type(),
                number,
                customer_id,
                initial_deposit
            ),
        );
        info!(account = %number, customer = customer_id, "account opened");
        Ok(opened)
    }

    /// Close a zero-balance account
    pub fn close_account(&self, account_number: &str, actor_id: &str) -> Result<()> {
        let account = Repository::<Account>::find_by_id(self.store.as_ref(), account_number)?
            .ok_or_else(|| BankError::NotFound(format!("account {}", account_number)))?;
        let (_guard, mut customer) = self.lock_customer(account.customer_id())?;

        let closed = customer.with_account(account_number, self.clock.now(), |a| a.close());
        if let Err(err) = closed {
            self.ledger.record_audit(
                actor_id,
                actions::ACCOUNT_CLOSURE_FAILED,
                &format!("Closing account {} failed: {}", account_number, err),
            );
            warn!(account = account_number, "account closure refused: {}", err);
            return Err(err);
        }
        Repository::<Customer>::update(self.store.as_ref(), &customer)?;

        self.ledger.record_audit(
            actor_id,
            actions::ACCOUNT_CLOSED,
            &format!("Account {} closed", account_number),
        );
        info!(account = account_number, "account closed");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
