// 👤 Customer Aggregate - owns accounts and an append-only audit trail
//
// Accounts and audit history are exposed as copies only. Every account
// operation goes through `with_account` so the account's journal lands
// in the customer's trail. Mutators take the instant to stamp on their
// audit entries; the aggregate never reads a clock itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::account::{Account, AccountOwner, AccountStatus};
use crate::entities::audit::{actions, AuditEntry};
use crate::error::{BankError, Result};

// ============================================================================
// CUSTOMER TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Individual,
    Joint,
    Business,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Individual => "INDIVIDUAL",
            CustomerType::Joint => "JOINT",
            CustomerType::Business => "BUSINESS",
        }
    }
}

impl FromStr for CustomerType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INDIVIDUAL" => Ok(CustomerType::Individual),
            "JOINT" => Ok(CustomerType::Joint),
            "BUSINESS" => Ok(CustomerType::Business),
            other => Err(BankError::invalid_argument(format!(
                "unknown customer type: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub first_name: String,
    pub surname: String,
    pub address: String,
    pub phone_number: String,
    pub email: String,
}

impl CustomerProfile {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("first name", &self.first_name),
            ("surname", &self.surname),
            ("address", &self.address),
            ("phone number", &self.phone_number),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BankError::invalid_argument(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }
        if !self.email.contains('@') {
            return Err(BankError::invalid_argument(format!(
                "invalid email address: {}",
                self.email
            )));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.surname)
    }
}

// ============================================================================
// CUSTOMER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    customer_id: String,
    user_id: String,
    username: String,
    profile: CustomerProfile,
    customer_type: CustomerType,
    accounts: Vec<Account>,
    audit_trail: Vec<AuditEntry>,
}

impl Customer {
    pub fn new(
        customer_id: &str,
        user_id: &str,
        username: &str,
        profile: CustomerProfile,
        customer_type: CustomerType,
    ) -> Result<Self> {
        Self::restore(
            customer_id,
            user_id,
            username,
            profile,
            customer_type,
            Vec::new(),
            Vec::new(),
        )
    }

    /// Rebuild a persisted customer with its accounts and audit history
    pub fn restore(
        customer_id: &str,
        user_id: &str,
        username: &str,
        profile: CustomerProfile,
        customer_type: CustomerType,
        accounts: Vec<Account>,
        audit_trail: Vec<AuditEntry>,
    ) -> Result<Self> {
        for (field, value) in [
            ("customer id", customer_id),
            ("user id", user_id),
            ("username", username),
        ] {
            if value.trim().is_empty() {
                return Err(BankError::invalid_argument(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }
        profile.validate()?;

        Ok(Customer {
            customer_id: customer_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            profile,
            customer_type,
            accounts,
            audit_trail,
        })
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn profile(&self) -> &CustomerProfile {
        &self.profile
    }

    pub fn customer_type(&self) -> CustomerType {
        self.customer_type
    }

    /// Owner reference stamped onto every account this customer holds
    pub fn owner(&self) -> AccountOwner {
        AccountOwner::new(&self.customer_id, &self.user_id)
    }

    // ------------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------------

    pub fn update_profile(&mut self, profile: CustomerProfile, at: DateTime<Utc>) -> Result<()> {
        profile.validate()?;
        self.profile = profile;
        self.record(
            actions::PROFILE_UPDATED,
            format!("Profile updated for customer {}", self.customer_id),
            at,
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------------

    pub fn add_account(&mut self, mut account: Account, at: DateTime<Utc>) -> Result<()> {
        if self.find_account(account.account_number()).is_some() {
            return Err(BankError::invalid_argument(format!(
                "customer {} already holds account {}",
                self.customer_id,
                account.account_number()
            )));
        }

        account.set_owner(self.owner());
        self.audit_trail.extend(account.drain_journal(at));
        self.record(
            actions::ACCOUNT_CREATED,
            format!(
                "{} account {} created with balance {:.2}",
                account.account_type(),
                account.account_number(),
                account.balance()
            ),
            at,
        );
        self.accounts.push(account);
        Ok(())
    }

    /// Copies of the owned accounts
    pub fn view_accounts(&self) -> Vec<Account> {
        self.accounts.clone()
    }

    pub fn find_account(&self, account_number: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.account_number() == account_number)
    }

    pub fn account_numbers(&self) -> Vec<String> {
        self.accounts
            .iter()
            .map(|a| a.account_number().to_string())
            .collect()
    }

    pub fn total_balance(&self) -> Decimal {
        self.accounts.iter().map(|a| a.balance()).sum()
    }

    /// True when every account is CLOSED with a zero balance
    pub fn can_be_deleted(&self) -> bool {
        self.accounts
            .iter()
            .all(|a| a.balance().is_zero() && a.status() == AccountStatus::Closed)
    }

    /// Run `op` against one owned account
    ///
    /// Whatever the account journaled (even on failure) moves into the
    /// customer's audit trail, stamped `at`.
    pub fn with_account<R>(
        &mut self,
        account_number: &str,
        at: DateTime<Utc>,
        op: impl FnOnce(&mut Account) -> Result<R>,
    ) -> Result<R> {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.account_number() == account_number)
            .ok_or_else(|| {
                BankError::NotFound(format!(
                    "account {} for customer {}",
                    account_number, self.customer_id
                ))
            })?;

        let result = op(account);
        let entries = account.drain_journal(at);
        self.audit_trail.extend(entries);
        result
    }

    // ------------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------------

    /// Copy of the full audit history
    pub fn audit_trail(&self) -> Vec<AuditEntry> {
        self.audit_trail.clone()
    }

    pub fn record(&mut self, action: &str, details: String, at: DateTime<Utc>) {
        let entry = AuditEntry::new(action, &self.user_id, details, at);
        self.audit_trail.push(entry);
    }
}

// ============================================================================
// TESTS
// ============================================================================
