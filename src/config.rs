//! Engine configuration: TOML file plus environment overrides

use anyhow::{ensure, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "BANK_DB_PATH";
pub const ENV_AUDIT_RETENTION_DAYS: &str = "BANK_AUDIT_RETENTION_DAYS";
pub const ENV_LOG: &str = "BANK_LOG";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// tracing-subscriber filter directive
    pub log_filter: String,

    pub interest: InterestConfig,
    pub accounts: AccountsConfig,
    pub audit: AuditConfig,
}

/// Interest accrual configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestConfig {
    /// Seconds between sweeps
    pub sweep_interval_secs: u64,

    /// Annual rate for new savings accounts
    pub savings_rate: Decimal,

    /// Annual rate for new investment accounts
    pub investment_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Floor for new savings accounts
    pub savings_minimum_balance: Decimal,
}

/// Audit trail configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Age after which entries are pruned
    pub retention_days: u32,

    pub unknown_actor: UnknownActorPolicy,
}

/// What to do with an audit entry whose actor is not a known identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownActorPolicy {
    /// Skip the entry and log a warning
    #[default]
    Drop,
    /// Record it under the reserved SYSTEM identity
    System,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("bank.db"),
            log_filter: "info,bank_core=debug".to_string(),
            interest: InterestConfig::default(),
            accounts: AccountsConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 86_400, // daily
            savings_rate: dec!(0.025),
            investment_rate: dec!(0.065),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            savings_minimum_balance: dec!(500),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            unknown_actor: UnknownActorPolicy::Drop,
        }
    }
}

impl BankConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// File (when given) or defaults, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.interest.sweep_interval_secs > 0,
            "interest.sweep_interval_secs must be greater than zero"
        );
        Ok(())
    }

    /// Apply `BANK_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(days) = lookup(ENV_AUDIT_RETENTION_DAYS) {
            self.audit.retention_days = days
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of days, got {:?}", ENV_AUDIT_RETENTION_DAYS, days))?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.interest.sweep_interval_secs)
    }
}
