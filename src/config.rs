//! Application configuration
//!
//! Layered as: built-in defaults, then an optional `ledger.toml` (or the file
//! named by `LEDGER_CONFIG`), then `LEDGER__*` environment variables, e.g.
//! `LEDGER__SIGNER__BACKEND=remote`.

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::LedgerError;

pub const DEFAULT_CONFIG_FILE: &str = "ledger.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub signer: SignerConfig,
    pub compliance: ComplianceConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerBackend {
    /// Secret key held by this process
    Local,
    /// External signing oracle reached over HTTP
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    pub backend: SignerBackend,
    pub key_name: String,
    /// Hex-encoded secret key file for the local backend. A fresh key is
    /// generated and written here when the file does not exist yet.
    pub key_path: Option<String>,
    pub oracle_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    pub min_confidence: f32,
}

impl AppConfig {
    pub fn load() -> Result<Self, LedgerError> {
        let path = env::var("LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, LedgerError> {
        let settings = config::Config::builder()
            .set_default("database_url", "sqlite://diagnostic-ledger.db")?
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 3000)?
            .set_default("signer.backend", "local")?
            .set_default("signer.key_name", "ledger_signing_key")?
            .set_default("signer.key_path", "ledger-signing.key")?
            .set_default("signer.timeout_secs", 10)?
            .set_default("compliance.min_confidence", 0.5)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LedgerError> {
        if self.signer.backend == SignerBackend::Remote && self.signer.oracle_url.is_none() {
            return Err(LedgerError::ConfigError(
                "signer.oracle_url is required for the remote signer backend".to_string(),
            ));
        }
        let min = self.compliance.min_confidence;
        if !(0.0..=1.0).contains(&min) {
            return Err(LedgerError::ConfigError(format!(
                "compliance.min_confidence must be in [0.0, 1.0], got {}",
                min
            )));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
