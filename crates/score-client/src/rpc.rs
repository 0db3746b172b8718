//! Chain RPC - the subset of Solana RPC the score protocol consumes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

/// Commitment level for reads and confirmation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// Fresh blockhash and the block height after which it expires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Options for sendTransaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendOptions {
    /// Skip the node's simulation before forwarding
    pub skip_preflight: bool,
    /// Commitment used for the preflight simulation
    pub preflight_commitment: Commitment,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
        }
    }
}

/// Status of a landed transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureStatus {
    /// Highest commitment the transaction has reached
    pub confirmation: Commitment,
    /// Execution error reported by the runtime, if any
    pub err: Option<String>,
}

impl SignatureStatus {
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        self.confirmation >= commitment
    }
}

/// Transaction awaiting confirmation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub signature: Signature,
    pub recent_blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// RPC errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Preflight simulation failed: {0}")]
    PreflightFailure(String),
    #[error("Node error {code}: {message}")]
    Node { code: i32, message: String },
}

impl RpcError {
    /// Whether retrying the call could succeed
    ///
    /// Preflight failures come from simulating the program and repeat on
    /// every attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RpcError::PreflightFailure(_))
    }
}

/// Chain RPC consumed by the submitter, session and poller
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Balance in lamports (0 for unknown accounts)
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// Raw account data, `None` when the account does not exist
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError>;

    async fn get_latest_blockhash(&self, commitment: Commitment)
        -> Result<LatestBlockhash, RpcError>;

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, RpcError>;

    /// Status of a signature, `None` if the node has not seen it land
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError>;

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, RpcError>;
}
