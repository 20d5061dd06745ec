//! Signing oracles
//!
//! The ledger never holds signing logic itself; it asks a `SigningOracle` for
//! an attestation over a record's canonical bytes. `LocalKeySigner` keeps a
//! secp256k1 key in process, `RemoteSigner` calls an external oracle that only
//! ever sees the SHA-256 digest.

use async_trait::async_trait;
use reqwest::Client;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::signatures::SignatureManager;
use crate::config::{SignerBackend, SignerConfig};
use crate::error::LedgerError;

/// Signature and the public key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

#[async_trait]
pub trait SigningOracle: Send + Sync {
    /// Sign `message`. Fails with `SigningUnavailable` when the oracle cannot
    /// be reached or answers with unusable material.
    async fn sign(&self, message: &[u8]) -> Result<Attestation, LedgerError>;

    /// Name of the signing key, for diagnostics.
    fn key_name(&self) -> &str;
}

pub struct LocalKeySigner {
    key_name: String,
    secret_key: SecretKey,
    public_key: Vec<u8>,
    manager: SignatureManager,
}

impl LocalKeySigner {
    pub fn new(key_name: impl Into<String>, secret_key: SecretKey) -> Self {
        let manager = SignatureManager::new();
        let public_key = manager.public_key_from_secret(&secret_key).serialize().to_vec();
        Self {
            key_name: key_name.into(),
            secret_key,
            public_key,
            manager,
        }
    }

    pub fn generate(key_name: impl Into<String>) -> Self {
        let secret_key = SignatureManager::new().generate_secret_key();
        Self::new(key_name, secret_key)
    }

    /// Load a hex-encoded secret key, creating the file with a fresh key
    /// when it does not exist.
    pub fn from_key_file(key_name: impl Into<String>, path: &Path) -> Result<Self, LedgerError> {
        if path.exists() {
            let encoded = std::fs::read_to_string(path).map_err(|e| {
                LedgerError::ConfigError(format!("Failed to read signing key {}: {}", path.display(), e))
            })?;
            let secret_key = parse_secret_key(encoded.trim())?;
            debug!("Loaded signing key from {}", path.display());
            return Ok(Self::new(key_name, secret_key));
        }

        let signer = Self::generate(key_name);
        write_secret_key(path, &signer.secret_key)?;
        warn!("No signing key at {}, generated a new one", path.display());
        Ok(signer)
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

#[async_trait]
impl SigningOracle for LocalKeySigner {
    async fn sign(&self, message: &[u8]) -> Result<Attestation, LedgerError> {
        let signature = self.manager.create_signature(message, &self.secret_key)?;
        Ok(Attestation {
            signature: signature.to_vec(),
            public_key: self.public_key.clone(),
        })
    }

    fn key_name(&self) -> &str {
        &self.key_name
    }
}

pub fn parse_secret_key(encoded: &str) -> Result<SecretKey, LedgerError> {
    let bytes = hex::decode(encoded)
        .map_err(|e| LedgerError::ConfigError(format!("Invalid signing key hex: {}", e)))?;
    SecretKey::from_slice(&bytes)
        .map_err(|e| LedgerError::ConfigError(format!("Invalid signing key: {}", e)))
}

pub fn write_secret_key(path: &Path, secret_key: &SecretKey) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            LedgerError::ConfigError(format!("Failed to create key directory: {}", e))
        })?;
    }
    std::fs::write(path, hex::encode(secret_key.secret_bytes())).map_err(|e| {
        LedgerError::ConfigError(format!("Failed to write signing key {}: {}", path.display(), e))
    })
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    key_name: &'a str,
    message_hash: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signature: String,
    public_key: String,
}

/// Client for an external signing oracle.
///
/// `POST {oracle_url}/sign` with `{"key_name", "message_hash"}` (hex SHA-256),
/// answered by `{"signature", "public_key"}` (hex).
pub struct RemoteSigner {
    oracle_url: String,
    key_name: String,
    http_client: Client,
}

impl RemoteSigner {
    pub fn new(oracle_url: String, key_name: String, timeout: Duration) -> Result<Self, LedgerError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        info!("Using remote signing oracle at {}", oracle_url);
        Ok(Self {
            oracle_url: oracle_url.trim_end_matches('/').to_string(),
            key_name,
            http_client,
        })
    }
}

#[async_trait]
impl SigningOracle for RemoteSigner {
    async fn sign(&self, message: &[u8]) -> Result<Attestation, LedgerError> {
        let request = SignRequest {
            key_name: &self.key_name,
            message_hash: hex::encode(SignatureManager::digest(message)),
        };

        let response = self
            .http_client
            .post(format!("{}/sign", self.oracle_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::SigningUnavailable(format!("Signing oracle unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(LedgerError::SigningUnavailable(format!(
                "Signing oracle returned {}",
                response.status()
            )));
        }

        let body: SignResponse = response.json().await.map_err(|e| {
            LedgerError::SigningUnavailable(format!("Malformed signing oracle response: {}", e))
        })?;

        let signature = hex::decode(&body.signature)
            .map_err(|e| LedgerError::SigningUnavailable(format!("Malformed signature: {}", e)))?;
        let public_key = hex::decode(&body.public_key)
            .map_err(|e| LedgerError::SigningUnavailable(format!("Malformed public key: {}", e)))?;

        debug!("Signing oracle returned {} byte signature", signature.len());
        Ok(Attestation {
            signature,
            public_key,
        })
    }

    fn key_name(&self) -> &str {
        &self.key_name
    }
}

/// Build the signing oracle selected by configuration.
pub fn build_signer(config: &SignerConfig) -> Result<Arc<dyn SigningOracle>, LedgerError> {
    match config.backend {
        SignerBackend::Local => {
            let signer = match &config.key_path {
                Some(path) => LocalKeySigner::from_key_file(config.key_name.clone(), Path::new(path))?,
                None => {
                    warn!("No signing key path configured, using an ephemeral key");
                    LocalKeySigner::generate(config.key_name.clone())
                }
            };
            info!(
                "Using local signing key '{}' ({})",
                config.key_name,
                hex::encode(signer.public_key())
            );
            Ok(Arc::new(signer))
        }
        SignerBackend::Remote => {
            let url = config.oracle_url.clone().ok_or_else(|| {
                LedgerError::ConfigError("signer.oracle_url is not set".to_string())
            })?;
            let signer = RemoteSigner::new(
                url,
                config.key_name.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(signer))
        }
    }
}
