use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::lottery_error::LotteryError;
use crate::lottery_state::RequestId;
use crate::utils::find_lottery_address;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum LotteryInstruction {
    /// Create the singleton lottery account
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The admin, pays for the lottery account
    /// 1. `[writable]` The lottery account (PDA)
    /// 2. `[]` The oracle authority that will deliver randomness
    /// 3. `[]` The oracle treasury receiving request fees
    /// 4. `[]` The system program
    InitializeLottery {
        /// Fixed price of one entry in lamports
        entry_fee: u64,
        /// Lamports paid to the oracle treasury per randomness request
        oracle_fee: u64,
    },

    /// Open a new round
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The lottery account
    OpenRound,

    /// Buy one entry in the open round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The participant
    /// 1. `[writable]` The lottery account
    /// 2. `[]` The system program
    Enter {
        /// Must equal the entry fee
        paid_amount: u64,
    },

    /// Stop taking entries
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The lottery account
    CloseRound,

    /// Ask the oracle for randomness for the closed round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The admin, pays the oracle fee
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The oracle treasury
    /// 3. `[]` The system program
    RequestDraw,

    /// Oracle callback carrying the randomness for the pending request
    ///
    /// Accounts expected:
    /// 0. `[signer]` The registered oracle
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The winning participant
    FulfillRandomness {
        request_id: RequestId,
        random_value: [u8; 32],
    },

    /// Abandon a pending request that will never be settled and ask again
    ///
    /// Accounts expected: same as `RequestDraw`
    ResolveDraw,

    /// Move the whole pool to a recipient, voiding any unsettled round
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The recipient
    SweepFunds,

    /// Accounts expected:
    /// 0. `[signer]` The current admin
    /// 1. `[]` The new admin
    /// 2. `[writable]` The lottery account
    TransferAdmin,

    /// Register a new oracle authority and treasury
    ///
    /// Accounts expected:
    /// 0. `[signer]` The admin
    /// 1. `[writable]` The lottery account
    /// 2. `[]` The new oracle authority
    /// 3. `[]` The new oracle treasury
    UpdateOracle { oracle_fee: u64 },
}

impl LotteryInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| LotteryError::InvalidInstruction.into())
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        borsh::to_vec(self).map_err(|_| ProgramError::InvalidInstructionData)
    }
}

fn build(
    program_id: &Pubkey,
    instruction: LotteryInstruction,
    accounts: Vec<AccountMeta>,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: instruction.pack()?,
    })
}

pub fn initialize_lottery(
    program_id: &Pubkey,
    admin: &Pubkey,
    oracle: &Pubkey,
    oracle_treasury: &Pubkey,
    entry_fee: u64,
    oracle_fee: u64,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::InitializeLottery {
            entry_fee,
            oracle_fee,
        },
        vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new_readonly(*oracle, false),
            AccountMeta::new_readonly(*oracle_treasury, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

pub fn open_round(program_id: &Pubkey, admin: &Pubkey) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::OpenRound,
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(lottery, false),
        ],
    )
}

pub fn enter(
    program_id: &Pubkey,
    participant: &Pubkey,
    paid_amount: u64,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::Enter { paid_amount },
        vec![
            AccountMeta::new(*participant, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

pub fn close_round(program_id: &Pubkey, admin: &Pubkey) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::CloseRound,
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(lottery, false),
        ],
    )
}

fn draw_accounts(
    program_id: &Pubkey,
    admin: &Pubkey,
    oracle_treasury: &Pubkey,
) -> Vec<AccountMeta> {
    let (lottery, _) = find_lottery_address(program_id);
    vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(lottery, false),
        AccountMeta::new(*oracle_treasury, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ]
}

pub fn request_draw(
    program_id: &Pubkey,
    admin: &Pubkey,
    oracle_treasury: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        LotteryInstruction::RequestDraw,
        draw_accounts(program_id, admin, oracle_treasury),
    )
}

pub fn resolve_draw(
    program_id: &Pubkey,
    admin: &Pubkey,
    oracle_treasury: &Pubkey,
) -> Result<Instruction, ProgramError> {
    build(
        program_id,
        LotteryInstruction::ResolveDraw,
        draw_accounts(program_id, admin, oracle_treasury),
    )
}

pub fn fulfill_randomness(
    program_id: &Pubkey,
    oracle: &Pubkey,
    winner: &Pubkey,
    request_id: RequestId,
    random_value: [u8; 32],
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::FulfillRandomness {
            request_id,
            random_value,
        },
        vec![
            AccountMeta::new_readonly(*oracle, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new(*winner, false),
        ],
    )
}

pub fn sweep_funds(
    program_id: &Pubkey,
    admin: &Pubkey,
    recipient: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::SweepFunds,
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new(*recipient, false),
        ],
    )
}

pub fn transfer_admin(
    program_id: &Pubkey,
    admin: &Pubkey,
    new_admin: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::TransferAdmin,
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new_readonly(*new_admin, false),
            AccountMeta::new(lottery, false),
        ],
    )
}

pub fn update_oracle(
    program_id: &Pubkey,
    admin: &Pubkey,
    oracle: &Pubkey,
    oracle_treasury: &Pubkey,
    oracle_fee: u64,
) -> Result<Instruction, ProgramError> {
    let (lottery, _) = find_lottery_address(program_id);
    build(
        program_id,
        LotteryInstruction::UpdateOracle { oracle_fee },
        vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new_readonly(*oracle, false),
            AccountMeta::new_readonly(*oracle_treasury, false),
        ],
    )
}
