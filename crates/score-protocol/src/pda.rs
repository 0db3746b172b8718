//! Score account PDA derivation

use crate::ProtocolError;
use solana_sdk::pubkey::Pubkey;

/// Seed literal for score account PDAs (matches the program)
pub const SCORE_SEED: &[u8] = b"score";

/// Derive the score account PDA for a player
///
/// Bumps are tried from 255 downward and the first off-curve hash wins, so
/// the same inputs always give the same `(address, bump)`.
pub fn derive_score_address(
    player: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), ProtocolError> {
    Pubkey::try_find_program_address(&[SCORE_SEED, player.as_ref()], program_id)
        .ok_or(ProtocolError::NoViableBump { player: *player })
}

/// Check a client-supplied score account address against the derived one
///
/// Returns the bump on success.
pub fn verify_score_address(
    player: &Pubkey,
    claimed: &Pubkey,
    program_id: &Pubkey,
) -> Result<u8, ProtocolError> {
    let (expected, bump) = derive_score_address(player, program_id)?;
    if expected != *claimed {
        return Err(ProtocolError::InvalidAddress {
            expected,
            provided: *claimed,
        });
    }
    Ok(bump)
}
