// 🧾 Transaction - immutable ledger record of one balance-affecting event
//
// Created exactly once per successful mutating operation, never updated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{BankError, Result};
use crate::ids;

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    /// Transfer between accounts of the same customer
    TransferInternal,
    /// Transfer to another customer's account
    TransferExternal,
    InterestPayment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TransferInternal => "TRANSFER_INTERNAL",
            TransactionType::TransferExternal => "TRANSFER_EXTERNAL",
            TransactionType::InterestPayment => "INTEREST_PAYMENT",
        }
    }
}

impl FromStr for TransactionType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER_INTERNAL" => Ok(TransactionType::TransferInternal),
            "TRANSFER_EXTERNAL" => Ok(TransactionType::TransferExternal),
            "INTEREST_PAYMENT" => Ok(TransactionType::InterestPayment),
            other => Err(BankError::invalid_argument(format!(
                "unknown transaction type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    /// Always > 0
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    /// Account this record affects
    pub account_number: String,
}

impl Transaction {
    /// Create a ledger record with a fresh id
    pub fn new(
        transaction_type: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
        account_number: &str,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        Self::with_id(
            ids::transaction_id(),
            transaction_type,
            amount,
            description,
            account_number,
            at,
        )
    }

    /// Rebuild a record under a known id (store loads)
    pub fn with_id(
        transaction_id: String,
        transaction_type: TransactionType,
        amount: Decimal,
        description: impl Into<String>,
        account_number: &str,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        if transaction_id.trim().is_empty() {
            return Err(BankError::invalid_argument("transaction id cannot be empty"));
        }
        if amount <= Decimal::ZERO {
            return Err(BankError::invalid_argument(
                "transaction amount must be positive",
            ));
        }
        if account_number.trim().is_empty() {
            return Err(BankError::invalid_argument(
                "transaction must reference an account",
            ));
        }

        Ok(Transaction {
            transaction_id,
            transaction_type,
            amount,
            timestamp: at,
            description: description.into(),
            account_number: account_number.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_creation() {
        let tx = Transaction::new(
            TransactionType::Withdrawal,
            dec!(200.00),
            "Withdrawal processed for account: ACC1",
            "ACC1",
            Utc::now(),
        )
        .unwrap();

        assert!(tx.transaction_id.starts_with("TXN_"));
        assert_eq!(tx.transaction_type, TransactionType::Withdrawal);
        assert_eq!(tx.amount, dec!(200.00));
        assert_eq!(tx.account_number, "ACC1");
    }

    #[test]
    fn test_transaction_rejects_non_positive_amount() {
        for amount in [dec!(0), dec!(-5)] {
            let err = Transaction::new(TransactionType::Deposit, amount, "", "ACC1", Utc::now())
                .unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[test]
    fn test_transaction_requires_account() {
        let err = Transaction::new(TransactionType::Deposit, dec!(1), "", "  ", Utc::now())
            .unwrap_err();
        assert!(matches!(err, BankError::InvalidArgument(_)));
    }

    #[test]
    fn test_transaction_type_text_form() {
        for ty in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::TransferInternal,
            TransactionType::TransferExternal,
            TransactionType::InterestPayment,
        ] {
            assert_eq!(ty.as_str().parse::<TransactionType>().unwrap(), ty);
        }
        assert!("REFUND".parse::<TransactionType>().is_err());
    }
}
