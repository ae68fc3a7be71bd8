// Lottery Program - Utility Functions
use solana_program::{clock::Clock, pubkey::Pubkey};

use crate::constants::LOTTERY_SEED;

/// Find the program derived address of the lottery account
pub fn find_lottery_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LOTTERY_SEED], program_id)
}

/// Key material for a randomness request: current slot followed by unix timestamp
pub fn draw_seed(clock: &Clock) -> [u8; 16] {
    let mut seed = [0u8; 16];
    seed[..8].copy_from_slice(&clock.slot.to_le_bytes());
    seed[8..].copy_from_slice(&clock.unix_timestamp.to_le_bytes());
    seed
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
