// 📄 Statement export - an account's ledger as CSV

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::entities::Transaction;

pub const STATEMENT_HEADER: [&str; 6] = [
    "transaction_id",
    "timestamp",
    "type",
    "amount",
    "description",
    "account_number",
];

#[derive(Serialize)]
struct StatementRow<'a> {
    transaction_id: &'a str,
    timestamp: String,
    transaction_type: &'static str,
    amount: String,
    description: &'a str,
    account_number: &'a str,
}

impl<'a> From<&'a Transaction> for StatementRow<'a> {
    fn from(tx: &'a Transaction) -> Self {
        StatementRow {
            transaction_id: &tx.transaction_id,
            timestamp: tx.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            transaction_type: tx.transaction_type.as_str(),
            amount: format!("{:.2}", tx.amount),
            description: &tx.description,
            account_number: &tx.account_number,
        }
    }
}

/// Write `transactions` as CSV (header always present); returns rows written
pub fn export_statement<W: Write>(transactions: &[Transaction], writer: W) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(STATEMENT_HEADER)
        .context("Failed to write statement header")?;
    for tx in transactions {
        wtr.serialize(StatementRow::from(tx))
            .with_context(|| format!("Failed to write transaction {}", tx.transaction_id))?;
    }
    wtr.flush().context("Failed to flush statement")?;

    Ok(transactions.len())
}

pub fn export_statement_to_path(transactions: &[Transaction], path: &Path) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create statement file {}", path.display()))?;
    export_statement(transactions, file)
}
