//! Wallet capability
//!
//! The game's wallet-connect layer provides one or more [`WalletProvider`]s.
//! The session borrows them per call; it never owns the player's key.

use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};
use std::sync::Arc;

/// Wallet errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("User rejected the request")]
    UserRejected,
    #[error("Wallet has not approved this site")]
    NotTrusted,
    #[error("Wallet unavailable: {0}")]
    Unavailable(String),
    #[error("Wallet not connected")]
    NotConnected,
}

/// A wallet that can connect and sign transactions
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Connect and return the player's public key
    ///
    /// With `only_if_trusted` the wallet must not prompt; it fails with
    /// `NotTrusted` unless the site was approved before.
    async fn connect(&self, only_if_trusted: bool) -> Result<Pubkey, WalletError>;

    /// Sign a transaction whose message and blockhash are already set
    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction, WalletError>;

    async fn disconnect(&self) {}
}

/// How a transaction gets its signature
#[derive(Clone)]
pub enum SignerCapability {
    /// Key held in-process (relay payer)
    Local(Arc<Keypair>),
    /// Signing delegated to a wallet, may prompt the user
    Wallet(Arc<dyn WalletProvider>),
}

impl SignerCapability {
    pub fn describe(&self) -> String {
        match self {
            SignerCapability::Local(keypair) => format!("local key {}", keypair.pubkey()),
            SignerCapability::Wallet(wallet) => format!("wallet {}", wallet.name()),
        }
    }
}

impl std::fmt::Debug for SignerCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Wallet backed by an in-process keypair
///
/// Always trusted and never prompts. Useful for bots and local play.
pub struct KeypairWallet {
    name: String,
    keypair: Arc<Keypair>,
}

impl KeypairWallet {
    pub fn new(name: &str, keypair: Keypair) -> Self {
        Self {
            name: name.to_string(),
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, _only_if_trusted: bool) -> Result<Pubkey, WalletError> {
        Ok(self.keypair.pubkey())
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_partial_sign(&[self.keypair.as_ref()], blockhash)
            .map_err(|e| WalletError::Unavailable(e.to_string()))?;
        Ok(transaction)
    }
}
