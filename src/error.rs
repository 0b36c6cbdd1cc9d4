//! Error taxonomy for the account/transaction engine

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for domain operations
pub type Result<T> = std::result::Result<T, BankError>;

/// Business rules an otherwise well-formed request can break
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusinessRule {
    /// Balance lower than the requested amount
    #[error("insufficient funds: balance {balance:.2}, requested {requested:.2}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    /// Operation would push the balance under the account's floor
    #[error("balance would fall below minimum of {floor:.2}")]
    MinimumBalance { floor: Decimal },

    /// Investment account has not been open long enough
    #[error("withdrawals require {required_days} days notice ({elapsed_days} elapsed)")]
    NoticePeriod { required_days: i64, elapsed_days: i64 },

    /// Opening deposit under the variant's minimum
    #[error("initial deposit must be at least {minimum:.2}")]
    InitialDeposit { minimum: Decimal },
}

/// Domain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    /// Malformed input (empty id, non-positive amount, same-account transfer)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not permitted in the entity's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Well-formed request rejected by a business rule
    #[error("Business rule violation: {0}")]
    BusinessRule(BusinessRule),

    /// Referenced account or customer is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying store failure
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl BankError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        BankError::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        BankError::InvalidState(msg.into())
    }

    /// Pure input-validation failures are never audited
    pub fn is_validation(&self) -> bool {
        matches!(self, BankError::InvalidArgument(_))
    }
}

impl From<BusinessRule> for BankError {
    fn from(rule: BusinessRule) -> Self {
        BankError::BusinessRule(rule)
    }
}

impl From<anyhow::Error> for BankError {
    fn from(err: anyhow::Error) -> Self {
        BankError::Persistence(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_business_rule_messages() {
        let err: BankError = BusinessRule::MinimumBalance { floor: dec!(500) }.into();
        assert_eq!(
            err.to_string(),
            "Business rule violation: balance would fall below minimum of 500.00"
        );

        let notice = BusinessRule::NoticePeriod {
            required_days: 30,
            elapsed_days: 12,
        };
        assert!(notice.to_string().contains("30 days notice"));
    }

    #[test]
    fn test_business_rule_is_std_error() {
        let rules: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(BusinessRule::InsufficientFunds {
                balance: dec!(20),
                requested: dec!(25.5),
            }),
            Box::new(BusinessRule::InitialDeposit { minimum: dec!(500) }),
        ];
        let messages: Vec<String> = rules.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "insufficient funds: balance 20.00, requested 25.50",
                "initial deposit must be at least 500.00",
            ]
        );
    }

    #[test]
    fn test_only_invalid_argument_is_validation() {
        assert!(BankError::invalid_argument("amount").is_validation());
        assert!(!BankError::invalid_state("closed").is_validation());
        assert!(!BankError::NotFound("ACC1".into()).is_validation());
    }

    #[test]
    fn test_anyhow_maps_to_persistence() {
        let err: BankError = anyhow::anyhow!("disk full").context("saving account").into();
        match err {
            BankError::Persistence(msg) => {
                assert!(msg.contains("saving account"));
                assert!(msg.contains("disk full"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
