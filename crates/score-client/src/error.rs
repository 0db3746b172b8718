//! Score client errors

use crate::{relay_client::RelayClientError, retry::Retryable, rpc::RpcError, wallet::WalletError};
use score_protocol::ProtocolError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Failure of a single submit attempt
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Transaction {signature} expired at block height {last_valid_block_height}")]
    Expired {
        signature: String,
        last_valid_block_height: u64,
    },
    #[error("Transaction {signature} failed: {details}")]
    Execution { signature: String, details: String },
    /// Sent, but its fate could not be read; resending could apply it twice
    #[error("Transaction {signature} unconfirmed: {last_error}")]
    Unconfirmed {
        signature: String,
        last_error: String,
    },
}

impl Retryable for AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Rpc(e) => e.is_transient(),
            AttemptError::Expired { .. } => true,
            AttemptError::Wallet(_)
            | AttemptError::Signing(_)
            | AttemptError::Execution { .. }
            | AttemptError::Unconfirmed { .. } => false,
        }
    }
}

/// Transaction submission errors
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("Wallet prompt declined by user")]
    UserRejected,
    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Submit failed after {attempts} attempts: {last_error}")]
    SubmitFailed { attempts: u32, last_error: String },
    #[error("Execution error: {0}")]
    ExecutionError(String),
}

impl SubmitError {
    pub(crate) fn from_attempt(attempts: u32, error: AttemptError) -> Self {
        match error {
            AttemptError::Wallet(WalletError::UserRejected) => SubmitError::UserRejected,
            AttemptError::Wallet(e) => SubmitError::WalletUnavailable(e.to_string()),
            AttemptError::Signing(e) => SubmitError::Signing(e),
            AttemptError::Execution { details, .. } => SubmitError::ExecutionError(details),
            AttemptError::Rpc(RpcError::PreflightFailure(details)) => {
                SubmitError::ExecutionError(details)
            }
            other => SubmitError::SubmitFailed {
                attempts,
                last_error: other.to_string(),
            },
        }
    }
}

/// Score protocol error taxonomy
///
/// Everything except `Configuration` is recoverable: the session downgrades
/// to local-only scoring and reports a notice.
#[derive(Debug, Clone, Error)]
pub enum ScoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Wallet not connected")]
    WalletNotConnected,
    #[error("Score account check already in progress")]
    AccountCheckInProgress,
    #[error("Insufficient funds: balance {balance} lamports, need {required}")]
    InsufficientFunds { balance: u64, required: u64 },
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error("Invalid score account address: expected {expected}, got {provided}")]
    InvalidAddress { expected: Pubkey, provided: Pubkey },
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
    #[error("Relay error: {0}")]
    Relay(#[from] RelayClientError),
    #[error(transparent)]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ScoreError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::InvalidAddress { expected, provided } => {
                ScoreError::InvalidAddress { expected, provided }
            }
            ProtocolError::NoViableBump { .. } => ScoreError::Configuration(e.to_string()),
            other => ScoreError::Protocol(other),
        }
    }
}
