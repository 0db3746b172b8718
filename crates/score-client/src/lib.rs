//! Score Client - chain side of the game's score protocol
//!
//! Handles everything between a collected item and the on-chain score:
//! - Chain RPC access (JSON-RPC over HTTP)
//! - Wallet capability and local signing
//! - Transaction submission with blockhash-fresh retries
//! - The per-player sync session (connect, account check, increments)
//! - The backend relay client and the leaderboard poller

pub mod error;
pub mod json_rpc;
pub mod poller;
pub mod relay_client;
pub mod retry;
pub mod rpc;
pub mod session;
pub mod submitter;
pub mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use error::{ScoreError, SubmitError};
pub use json_rpc::JsonRpcChainClient;
pub use poller::ScorePoller;
pub use relay_client::{HttpRelayClient, RelayClientError, ScoreRelay};
pub use retry::{retry_with_backoff, RetryError, RetryPolicy, Retryable};
pub use rpc::{ChainRpc, Commitment, LatestBlockhash, RpcError, SendOptions, SignatureStatus};
pub use session::{
    AccountCheckOutcome, CollectReceipt, ConnectOutcome, ConnectTrigger, DegradedReason, Notice,
    NoticeLevel, ScoreSession, ScoreSessionBuilder, SessionConfig, SyncOutcome, SyncPhase,
    SyncTransport,
};
pub use submitter::{SubmitterConfig, TransactionSubmitter};
pub use wallet::{KeypairWallet, SignerCapability, WalletError, WalletProvider};
