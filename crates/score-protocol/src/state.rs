//! Score Account State
//!
//! Layout (41 bytes): is_initialized[1] + player[32] + score[8, LE].

use crate::{ProtocolError, MAX_SCORE};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

/// Score account record (matches the program's ScoreAccount)
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreAccount {
    /// Set once the Initialize instruction has run
    pub is_initialized: bool,
    /// Player that owns this score
    pub player: Pubkey,
    /// Accumulated score
    pub score: u64,
}

impl ScoreAccount {
    /// Account size: 1 + 32 + 8 = 41
    pub const LEN: usize = 1 + 32 + 8;
    /// Byte offset of the score field
    pub const SCORE_OFFSET: usize = 33;

    /// Fresh account as written by Initialize
    pub fn initialized(player: Pubkey) -> Self {
        Self {
            is_initialized: true,
            player,
            score: 0,
        }
    }

    /// Serialize to the 41-byte layout
    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::LEN);
        data.push(self.is_initialized as u8);
        data.extend_from_slice(self.player.as_ref());
        data.extend_from_slice(&self.score.to_le_bytes());
        data
    }

    /// Parse the leading 41 bytes of account data
    pub fn unpack(data: &[u8]) -> Result<Self, ProtocolError> {
        let bytes = data
            .get(..Self::LEN)
            .ok_or(ProtocolError::InvalidAccountData)?;
        Self::try_from_slice(bytes).map_err(|_| ProtocolError::InvalidAccountData)
    }

    /// Apply an increment the way the program does
    ///
    /// Refused when the current score is above MAX_SCORE or the sum overflows.
    pub fn apply_increment(&mut self, amount: u64) -> Result<u64, ProtocolError> {
        if self.score > MAX_SCORE {
            return Err(ProtocolError::InvalidAccountData);
        }
        self.score = self
            .score
            .checked_add(amount)
            .ok_or(ProtocolError::InvalidAccountData)?;
        Ok(self.score)
    }
}

/// Observed state of a score account
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountState {
    /// No account at the derived address
    NotFound,
    /// Data present but too short or not flagged as initialized
    Uninitialized,
    /// Initialized account
    Active { player: Pubkey, score: u64 },
}

impl AccountState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Score if the account is active
    pub fn score(&self) -> Option<u64> {
        match self {
            Self::Active { score, .. } => Some(*score),
            _ => None,
        }
    }
}

/// Read raw account bytes into an [`AccountState`]
///
/// Never fails: any length or flag mismatch reads as `Uninitialized` so
/// callers go on to initialize the account.
pub fn read_account_state(data: Option<&[u8]>) -> AccountState {
    let Some(data) = data else {
        return AccountState::NotFound;
    };

    if data.len() < ScoreAccount::LEN || data[0] != 1 {
        return AccountState::Uninitialized;
    }

    match ScoreAccount::unpack(data) {
        Ok(account) => AccountState::Active {
            player: account.player,
            score: account.score,
        },
        Err(_) => AccountState::Uninitialized,
    }
}
