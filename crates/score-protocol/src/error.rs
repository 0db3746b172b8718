//! Protocol Errors

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors raised while encoding, decoding or deriving score protocol values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("No viable bump seed for score account of {player}")]
    NoViableBump { player: Pubkey },

    #[error("Invalid score account address: expected {expected}, got {provided}")]
    InvalidAddress { expected: Pubkey, provided: Pubkey },

    #[error("Invalid instruction data")]
    InvalidInstructionData,

    #[error("Invalid account data")]
    InvalidAccountData,

    #[error("Unknown item type: {0}")]
    UnknownItem(String),
}
