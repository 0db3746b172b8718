//! Score Program Instructions

use crate::ProtocolError;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

/// Score program instructions
///
/// The Borsh enum tag is the opcode byte, so the serialized form is
/// `[opcode] ++ payload`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreInstruction {
    /// Create and initialize the player's score account
    ///
    /// Accounts:
    /// 0. `[writable]` Score account (PDA)
    /// 1. `[signer, writable]` Player (payer and owner)
    /// 2. `[]` System program
    Initialize,

    /// Add `amount` to the stored score
    ///
    /// Accounts:
    /// 0. `[writable]` Score account (PDA)
    /// 1. `[]` Player
    /// 2. `[]` System program
    IncrementScore {
        /// Points to add (little-endian u64 on the wire)
        amount: u64,
    },
}

impl ScoreInstruction {
    pub const INITIALIZE_OPCODE: u8 = 0;
    pub const INCREMENT_OPCODE: u8 = 1;

    /// Serialize to instruction data
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Self::Initialize => encode_initialize().to_vec(),
            Self::IncrementScore { amount } => encode_increment(*amount).to_vec(),
        }
    }

    /// Parse instruction data
    ///
    /// Bytes past the payload are ignored, as the program does.
    pub fn unpack(data: &[u8]) -> Result<Self, ProtocolError> {
        let (&opcode, rest) = data
            .split_first()
            .ok_or(ProtocolError::InvalidInstructionData)?;

        match opcode {
            Self::INITIALIZE_OPCODE => Ok(Self::Initialize),
            Self::INCREMENT_OPCODE => {
                let amount = rest
                    .get(..8)
                    .and_then(|bytes| bytes.try_into().ok())
                    .map(u64::from_le_bytes)
                    .ok_or(ProtocolError::InvalidInstructionData)?;
                Ok(Self::IncrementScore { amount })
            }
            _ => Err(ProtocolError::InvalidInstructionData),
        }
    }
}

/// Initialize instruction data: always `[0]`
pub fn encode_initialize() -> [u8; 1] {
    [ScoreInstruction::INITIALIZE_OPCODE]
}

/// IncrementScore instruction data: `[1]` followed by `amount` as LE u64
pub fn encode_increment(amount: u64) -> [u8; 9] {
    let mut data = [0u8; 9];
    data[0] = ScoreInstruction::INCREMENT_OPCODE;
    data[1..].copy_from_slice(&amount.to_le_bytes());
    data
}

/// Build the Initialize instruction
pub fn initialize_instruction(
    program_id: &Pubkey,
    score_account: &Pubkey,
    player: &Pubkey,
) -> Instruction {
    Instruction::new_with_bytes(
        *program_id,
        &encode_initialize(),
        vec![
            AccountMeta::new(*score_account, false),
            AccountMeta::new(*player, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Build the IncrementScore instruction
///
/// The player is not a signer, so a relay can pay for and sign increments.
pub fn increment_instruction(
    program_id: &Pubkey,
    score_account: &Pubkey,
    player: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction::new_with_bytes(
        *program_id,
        &encode_increment(amount),
        vec![
            AccountMeta::new(*score_account, false),
            AccountMeta::new_readonly(*player, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}
