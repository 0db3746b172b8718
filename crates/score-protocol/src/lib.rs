//! Shared types for the score program protocol
//!
//! This crate mirrors the on-chain score program's wire format so that the
//! game client and the backend relay agree on it:
//! - PDA derivation for per-player score accounts
//! - Instruction encoding (Initialize / IncrementScore)
//! - Score account layout and state reading
//! - Item scoring table and relay HTTP payloads

pub mod error;
pub mod instruction;
pub mod items;
pub mod pda;
pub mod relay;
pub mod state;

pub use error::ProtocolError;
pub use instruction::{
    encode_increment, encode_initialize, increment_instruction, initialize_instruction,
    ScoreInstruction,
};
pub use items::ItemKind;
pub use pda::{derive_score_address, verify_score_address, SCORE_SEED};
pub use relay::{CollectItemRequest, CollectItemResponse, RelayErrorBody};
pub use state::{read_account_state, AccountState, ScoreAccount};

/// Score ceiling enforced by the program (matches on-chain MAX_SCORE)
///
/// Increments are refused once the stored score is above this value.
pub const MAX_SCORE: u64 = 1_000_000;
