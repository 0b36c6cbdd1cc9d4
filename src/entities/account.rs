// 💳 Account Entity - balance-bearing account with per-variant rules
//
// One struct carries the state every account shares (number, balance,
// dates, status, owner); the variant-specific terms live in a closed
// `AccountKind` enum and each operation dispatches on it:
//
// - Savings:    no direct withdrawals, transfers keep a minimum balance,
//               interest accrues every 30 days
// - Investment: notice-checked withdrawals above a 500 floor,
//               interest accrues every 90 days
// - Cheque:     plain deposit/withdraw, carries employer metadata
//
// Invariant: balance >= 0 after every operation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::audit::{actions, AuditEntry, JournalRecord};
use crate::error::{BankError, BusinessRule, Result};
use crate::temporal::days_between;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const SAVINGS_DEFAULT_RATE: Decimal = dec!(0.025);
pub const SAVINGS_DEFAULT_MINIMUM_BALANCE: Decimal = dec!(500);
pub const SAVINGS_ACCRUAL_PERIOD_DAYS: i64 = 30;

pub const INVESTMENT_DEFAULT_RATE: Decimal = dec!(0.065);
pub const INVESTMENT_MINIMUM_INITIAL_DEPOSIT: Decimal = dec!(500);
pub const INVESTMENT_MINIMUM_BALANCE: Decimal = dec!(500);
pub const INVESTMENT_ACCRUAL_PERIOD_DAYS: i64 = 90;
pub const INVESTMENT_NOTICE_DAYS: i64 = 30;

const DAYS_PER_YEAR: Decimal = dec!(365);

// ============================================================================
// STATUS & TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Closed,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Closed => "CLOSED",
            AccountStatus::Suspended => "SUSPENDED",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "INACTIVE" => Ok(AccountStatus::Inactive),
            "CLOSED" => Ok(AccountStatus::Closed),
            "SUSPENDED" => Ok(AccountStatus::Suspended),
            other => Err(BankError::invalid_argument(format!(
                "unknown account status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Investment,
    Cheque,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Investment => "INVESTMENT",
            AccountType::Cheque => "CHEQUE",
        }
    }
}

impl FromStr for AccountType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SAVINGS" => Ok(AccountType::Savings),
            "INVESTMENT" => Ok(AccountType::Investment),
            "CHEQUE" => Ok(AccountType::Cheque),
            other => Err(BankError::invalid_argument(format!(
                "unknown account type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// VARIANT TERMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsTerms {
    pub interest_rate: Decimal,
    pub minimum_balance: Decimal,
    pub last_interest_applied: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentTerms {
    pub interest_rate: Decimal,
    pub last_interest_applied: NaiveDate,
}

impl InvestmentTerms {
    /// Opening-time check only; never enforced after the account exists
    pub fn validate_initial_deposit(amount: Decimal) -> bool {
        amount >= INVESTMENT_MINIMUM_INITIAL_DEPOSIT
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentDetails {
    pub employer_name: String,
    pub employer_address: String,
    pub employed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    Savings(SavingsTerms),
    Investment(InvestmentTerms),
    Cheque(EmploymentDetails),
}

impl AccountKind {
    /// Savings terms; interest accrues from `opened_on`
    pub fn savings(interest_rate: Decimal, minimum_balance: Decimal, opened_on: NaiveDate) -> Self {
        AccountKind::Savings(SavingsTerms {
            interest_rate,
            minimum_balance,
            last_interest_applied: opened_on,
        })
    }

    pub fn investment(interest_rate: Decimal, opened_on: NaiveDate) -> Self {
        AccountKind::Investment(InvestmentTerms {
            interest_rate,
            last_interest_applied: opened_on,
        })
    }

    pub fn cheque(employer_name: &str, employer_address: &str, employed: bool) -> Self {
        AccountKind::Cheque(EmploymentDetails {
            employer_name: employer_name.to_string(),
            employer_address: employer_address.to_string(),
            employed,
        })
    }

    pub fn account_type(&self) -> AccountType {
        match self {
            AccountKind::Savings(_) => AccountType::Savings,
            AccountKind::Investment(_) => AccountType::Investment,
            AccountKind::Cheque(_) => AccountType::Cheque,
        }
    }
}

// ============================================================================
// OWNER
// ============================================================================

/// Back-reference to the owning customer, used for audit attribution only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOwner {
    pub customer_id: String,
    /// Identity the account's own audit entries are attributed to
    pub user_id: String,
}

impl AccountOwner {
    pub fn new(customer_id: &str, user_id: &str) -> Self {
        AccountOwner {
            customer_id: customer_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    account_number: String,
    balance: Decimal,
    date_created: NaiveDate,
    date_opened: NaiveDate,
    status: AccountStatus,
    owner: AccountOwner,
    kind: AccountKind,

    /// Actions recorded since the caller last drained them
    #[serde(skip)]
    journal: Vec<JournalRecord>,
}

impl Account {
    pub fn new(
        account_number: impl Into<String>,
        balance: Decimal,
        date_created: NaiveDate,
        date_opened: NaiveDate,
        status: AccountStatus,
        owner: AccountOwner,
        kind: AccountKind,
    ) -> Result<Self> {
        let account_number = account_number.into();
        if account_number.trim().is_empty() {
            return Err(BankError::invalid_argument(
                "account number cannot be empty",
            ));
        }
        if balance < Decimal::ZERO {
            return Err(BankError::invalid_argument("balance cannot be negative"));
        }

        Ok(Account {
            account_number,
            balance,
            date_created,
            date_opened,
            status,
            owner,
            kind,
            journal: Vec::new(),
        })
    }

    /// New ACTIVE account created and opened on `opened_on`
    pub fn open(
        account_number: impl Into<String>,
        kind: AccountKind,
        initial_deposit: Decimal,
        owner: AccountOwner,
        opened_on: NaiveDate,
    ) -> Result<Self> {
        Self::new(
            account_number,
            initial_deposit,
            opened_on,
            opened_on,
            AccountStatus::Active,
            owner,
            kind,
        )
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn date_created(&self) -> NaiveDate {
        self.date_created
    }

    pub fn date_opened(&self) -> NaiveDate {
        self.date_opened
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn owner(&self) -> &AccountOwner {
        &self.owner
    }

    pub fn customer_id(&self) -> &str {
        &self.owner.customer_id
    }

    pub fn kind(&self) -> &AccountKind {
        &self.kind
    }

    pub fn account_type(&self) -> AccountType {
        self.kind.account_type()
    }

    pub fn is_interest_bearing(&self) -> bool {
        matches!(
            self.kind,
            AccountKind::Savings(_) | AccountKind::Investment(_)
        )
    }

    pub fn interest_rate(&self) -> Option<Decimal> {
        match &self.kind {
            AccountKind::Savings(terms) => Some(terms.interest_rate),
            AccountKind::Investment(terms) => Some(terms.interest_rate),
            AccountKind::Cheque(_) => None,
        }
    }

    /// Floor a withdrawal or transfer must not breach
    pub fn minimum_balance(&self) -> Option<Decimal> {
        match &self.kind {
            AccountKind::Savings(terms) => Some(terms.minimum_balance),
            AccountKind::Investment(_) => Some(INVESTMENT_MINIMUM_BALANCE),
            AccountKind::Cheque(_) => None,
        }
    }

    pub fn last_interest_applied(&self) -> Option<NaiveDate> {
        match &self.kind {
            AccountKind::Savings(terms) => Some(terms.last_interest_applied),
            AccountKind::Investment(terms) => Some(terms.last_interest_applied),
            AccountKind::Cheque(_) => None,
        }
    }

    pub(crate) fn set_owner(&mut self, owner: AccountOwner) {
        self.owner = owner;
    }

    // ------------------------------------------------------------------------
    // Audit journal
    // ------------------------------------------------------------------------

    pub fn journal(&self) -> &[JournalRecord] {
        &self.journal
    }

    /// Hand over everything recorded since the last drain, stamped `at`
    pub fn drain_journal(&mut self, at: DateTime<Utc>) -> Vec<AuditEntry> {
        self.journal
            .drain(..)
            .map(|record| record.stamp(at))
            .collect()
    }

    fn record(&mut self, action: &str, details: String) {
        let record = JournalRecord::new(action, &self.owner.user_id, details);
        self.journal.push(record);
    }

    // ------------------------------------------------------------------------
    // Shared validation
    // ------------------------------------------------------------------------

    /// Every balance movement: amount > 0, then status ACTIVE
    fn check_movement(&self, amount: Decimal, verb: &str) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(BankError::invalid_argument(format!(
                "{} amount must be positive",
                verb
            )));
        }
        if self.status != AccountStatus::Active {
            return Err(BankError::invalid_state(format!(
                "cannot {} account {} while it is {}",
                verb, self.account_number, self.status
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Deposit / withdraw
    // ------------------------------------------------------------------------

    /// Credit `amount`; returns the new balance
    pub fn deposit(&mut self, amount: Decimal) -> Result<Decimal> {
        self.check_movement(amount, "deposit to")?;

        self.balance += amount;
        self.record(
            actions::DEPOSIT,
            format!(
                "Deposited {:.2} to account {}. New balance: {:.2}",
                amount, self.account_number, self.balance
            ),
        );
        Ok(self.balance)
    }

    /// Withdraw using today's date for any day-counting rule
    pub fn withdraw(&mut self, amount: Decimal) -> Result<Decimal> {
        self.withdraw_on(amount, Utc::now().date_naive())
    }

    /// Debit `amount` under the variant's rules; returns the new balance
    ///
    /// Savings accounts never allow it, investment accounts apply the
    /// notice-checked rules of [`Account::withdraw_amount_on`].
    pub fn withdraw_on(&mut self, amount: Decimal, today: NaiveDate) -> Result<Decimal> {
        match self.kind {
            AccountKind::Savings(_) => Err(BankError::invalid_state(format!(
                "withdrawals not permitted from savings account {}; use a transfer",
                self.account_number
            ))),
            AccountKind::Investment(_) => self.withdraw_amount_on(amount, today),
            AccountKind::Cheque(_) => self.debit(amount),
        }
    }

    fn debit(&mut self, amount: Decimal) -> Result<Decimal> {
        self.check_movement(amount, "withdraw from")?;
        if self.balance < amount {
            return Err(BusinessRule::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            }
            .into());
        }

        self.balance -= amount;
        self.record(
            actions::WITHDRAWAL,
            format!(
                "Withdrew {:.2} from account {}. New balance: {:.2}",
                amount, self.account_number, self.balance
            ),
        );
        Ok(self.balance)
    }

    pub fn withdraw_amount(&mut self, amount: Decimal) -> Result<Decimal> {
        self.withdraw_amount_on(amount, Utc::now().date_naive())
    }

    /// Investment withdrawal: floor of 500 and 30 days since opening
    pub fn withdraw_amount_on(&mut self, amount: Decimal, today: NaiveDate) -> Result<Decimal> {
        if !matches!(self.kind, AccountKind::Investment(_)) {
            return Err(BankError::invalid_state(format!(
                "account {} is not an investment account",
                self.account_number
            )));
        }
        self.check_movement(amount, "withdraw from")?;

        if self.balance - amount < INVESTMENT_MINIMUM_BALANCE {
            return Err(BusinessRule::MinimumBalance {
                floor: INVESTMENT_MINIMUM_BALANCE,
            }
            .into());
        }

        let elapsed_days = days_between(self.date_opened, today);
        if elapsed_days < INVESTMENT_NOTICE_DAYS {
            return Err(BusinessRule::NoticePeriod {
                required_days: INVESTMENT_NOTICE_DAYS,
                elapsed_days,
            }
            .into());
        }

        self.balance -= amount;
        self.record(
            actions::WITHDRAWAL,
            format!(
                "Investment account withdrawal: {:.2} from account {}. New balance: {:.2}",
                amount, self.account_number, self.balance
            ),
        );
        Ok(self.balance)
    }

    // ------------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------------

    pub fn transfer_to(&mut self, target: &mut Account, amount: Decimal) -> Result<()> {
        self.transfer_to_on(target, amount, Utc::now().date_naive())
    }

    /// Move `amount` from this account into `target`
    ///
    /// Both legs apply or neither does: the target is checked before the
    /// source is debited, and the debit is reversed if the credit fails.
    pub fn transfer_to_on(
        &mut self,
        target: &mut Account,
        amount: Decimal,
        today: NaiveDate,
    ) -> Result<()> {
        if target.account_number == self.account_number {
            return Err(BankError::invalid_argument(
                "cannot transfer to the same account",
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(BankError::invalid_argument(
                "transfer amount must be positive",
            ));
        }
        target.check_movement(amount, "deposit to")?;

        match &self.kind {
            AccountKind::Savings(terms) => {
                let floor = terms.minimum_balance;
                self.check_movement(amount, "transfer from")?;
                if amount > self.balance - floor {
                    return Err(BusinessRule::MinimumBalance { floor }.into());
                }

                self.balance -= amount;
                self.record(
                    actions::TRANSFER_OUT,
                    format!(
                        "Transferred {:.2} from savings account {} to {}. New balance: {:.2}",
                        amount, self.account_number, target.account_number, self.balance
                    ),
                );
            }
            AccountKind::Investment(_) | AccountKind::Cheque(_) => {
                self.withdraw_on(amount, today)?;
            }
        }

        if let Err(err) = target.deposit(amount) {
            self.balance += amount;
            self.journal.pop();
            return Err(err);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Interest
    // ------------------------------------------------------------------------

    pub fn calculate_interest(&self) -> Decimal {
        self.calculate_interest_on(Utc::now().date_naive())
    }

    /// Simple daily-rate accrual over the window since the last application
    ///
    /// Zero unless the account is ACTIVE, interest-bearing and the window
    /// has reached the variant's period (30 days savings, 90 investment).
    /// Rounded to cents.
    pub fn calculate_interest_on(&self, today: NaiveDate) -> Decimal {
        let (rate, last_applied, period) = match &self.kind {
            AccountKind::Savings(terms) => (
                terms.interest_rate,
                terms.last_interest_applied,
                SAVINGS_ACCRUAL_PERIOD_DAYS,
            ),
            AccountKind::Investment(terms) => (
                terms.interest_rate,
                terms.last_interest_applied,
                INVESTMENT_ACCRUAL_PERIOD_DAYS,
            ),
            AccountKind::Cheque(_) => return Decimal::ZERO,
        };

        if self.status != AccountStatus::Active {
            return Decimal::ZERO;
        }

        let elapsed_days = days_between(last_applied, today);
        if elapsed_days < period {
            return Decimal::ZERO;
        }

        let daily_rate = rate / DAYS_PER_YEAR;
        (self.balance * daily_rate * Decimal::from(elapsed_days))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn apply_interest(&mut self) -> Result<Decimal> {
        self.apply_interest_on(Utc::now().date_naive())
    }

    /// Credit accrued interest and restart the accrual window
    ///
    /// Returns the amount credited (zero when nothing was due).
    pub fn apply_interest_on(&mut self, today: NaiveDate) -> Result<Decimal> {
        if !self.is_interest_bearing() {
            return Err(BankError::invalid_state(format!(
                "account {} does not bear interest",
                self.account_number
            )));
        }

        let interest = self.calculate_interest_on(today);
        if interest <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        self.balance += interest;
        match &mut self.kind {
            AccountKind::Savings(terms) => terms.last_interest_applied = today,
            AccountKind::Investment(terms) => terms.last_interest_applied = today,
            AccountKind::Cheque(_) => {}
        }

        let account_type = self.account_type();
        self.record(
            actions::INTEREST_APPLIED,
            format!(
                "Interest of {:.2} applied to {} account {}. New balance: {:.2}",
                interest,
                account_type.as_str().to_lowercase(),
                self.account_number,
                self.balance
            ),
        );
        Ok(interest)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Opening-time initial deposit check for this variant
    pub fn validate_initial_deposit(&self, amount: Decimal) -> bool {
        match self.kind {
            AccountKind::Investment(_) => InvestmentTerms::validate_initial_deposit(amount),
            AccountKind::Savings(_) | AccountKind::Cheque(_) => amount >= Decimal::ZERO,
        }
    }

    pub fn update_status(&mut self, status: AccountStatus) -> Result<()> {
        if status == AccountStatus::Closed && !self.balance.is_zero() {
            return Err(BankError::invalid_state(format!(
                "cannot close account {} with balance {:.2}; balance must be zero",
                self.account_number, self.balance
            )));
        }
        if status == self.status {
            return Ok(());
        }

        let old = self.status;
        self.status = status;
        self.record(
            actions::STATUS_CHANGED,
            format!(
                "Account {} status changed from {} to {}",
                self.account_number, old, status
            ),
        );
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.update_status(AccountStatus::Closed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
