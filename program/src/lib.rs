// Round Lottery
// A single-round-at-a-time lottery on Solana, settled by an external randomness oracle

pub mod constants;
pub mod custodian;
pub mod lottery_error;
pub mod lottery_event;
pub mod lottery_instruction;
pub mod lottery_processor;
pub mod lottery_state;
pub mod round_machine;
pub mod utils;
pub mod vrf;

#[cfg(not(feature = "no-entrypoint"))]
mod lottery_entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

/// Processor entry used by `solana-program-test` and by the on-chain entrypoint
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    lottery_processor::Processor::process(program_id, accounts, instruction_data)
}
