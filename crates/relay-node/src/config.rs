//! Relay Node Configuration

use score_client::{RetryPolicy, SendOptions, SubmitterConfig};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair},
};
use std::{path::Path, str::FromStr, time::Duration};

/// Relay node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Chain JSON-RPC URL
    pub rpc_url: String,
    /// HTTP bind address for the relay
    pub bind_addr: String,
    /// Score program ID (base58)
    pub program_id: Option<String>,
    /// Skip the node's preflight simulation
    pub skip_preflight: bool,
    /// Submit attempts per increment
    pub max_attempts: u32,
    /// Score poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            bind_addr: "127.0.0.1:3001".to_string(),
            program_id: None,
            skip_preflight: false,
            max_attempts: 3,
            poll_interval_ms: 2000,
        }
    }
}

impl RelayConfig {
    pub fn program_id(&self) -> Result<Pubkey, ConfigError> {
        let raw = self
            .program_id
            .as_deref()
            .ok_or(ConfigError::MissingProgramId)?;
        Pubkey::from_str(raw).map_err(|_| ConfigError::InvalidPubkey {
            field: "program id",
            value: raw.to_string(),
        })
    }

    pub fn submitter_config(&self) -> Result<SubmitterConfig, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }

        Ok(SubmitterConfig {
            send_options: SendOptions {
                skip_preflight: self.skip_preflight,
                ..Default::default()
            },
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Load the signing key from a keypair file or a base58 secret
///
/// The file wins when both are given.
pub fn load_keypair(file: Option<&Path>, secret: Option<&str>) -> Result<Keypair, ConfigError> {
    if let Some(path) = file {
        return read_keypair_file(path).map_err(|e| ConfigError::KeypairFile {
            path: path.display().to_string(),
            message: e.to_string(),
        });
    }

    let secret = secret.ok_or(ConfigError::MissingKeypair)?;
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .map_err(|e| ConfigError::InvalidSecret(e.to_string()))?;
    Keypair::from_bytes(&bytes).map_err(|e| ConfigError::InvalidSecret(e.to_string()))
}

pub fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value).map_err(|_| ConfigError::InvalidPubkey {
        field,
        value: value.to_string(),
    })
}

/// Startup configuration errors; all fatal
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Score program id not set (--program-id or SCORE_PROGRAM_ID)")]
    MissingProgramId,
    #[error("Invalid {field}: {value}")]
    InvalidPubkey { field: &'static str, value: String },
    #[error("No signing key (--payer-keypair or RELAY_PAYER_SECRET)")]
    MissingKeypair,
    #[error("Cannot read keypair {path}: {message}")]
    KeypairFile { path: String, message: String },
    #[error("Invalid base58 secret key: {0}")]
    InvalidSecret(String),
    #[error("--player is required in this mode")]
    MissingPlayer,
    #[error("--max-attempts must be at least 1")]
    InvalidMaxAttempts,
}
