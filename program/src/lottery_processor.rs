// Lottery Program - Instruction Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::constants::LOTTERY_SEED;
use crate::custodian::LamportCustodian;
use crate::lottery_error::LotteryError;
use crate::lottery_event::LotteryEvent;
use crate::lottery_instruction::LotteryInstruction;
use crate::lottery_state::{Lottery, RequestId};
use crate::round_machine::RoundMachine;
use crate::utils::{self, find_lottery_address};
use crate::vrf::FeeOracle;

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LotteryInstruction::unpack(instruction_data)?;

        match instruction {
            LotteryInstruction::InitializeLottery {
                entry_fee,
                oracle_fee,
            } => {
                msg!("Instruction: Initialize Lottery");
                Self::process_initialize_lottery(program_id, accounts, entry_fee, oracle_fee)
            }
            LotteryInstruction::OpenRound => {
                msg!("Instruction: Open Round");
                Self::process_open_round(program_id, accounts)
            }
            LotteryInstruction::Enter { paid_amount } => {
                msg!("Instruction: Enter");
                Self::process_enter(program_id, accounts, paid_amount)
            }
            LotteryInstruction::CloseRound => {
                msg!("Instruction: Close Round");
                Self::process_close_round(program_id, accounts)
            }
            LotteryInstruction::RequestDraw => {
                msg!("Instruction: Request Draw");
                Self::process_request_draw(program_id, accounts, false)
            }
            LotteryInstruction::FulfillRandomness {
                request_id,
                random_value,
            } => {
                msg!("Instruction: Fulfill Randomness");
                Self::process_fulfill_randomness(program_id, accounts, request_id, random_value)
            }
            LotteryInstruction::ResolveDraw => {
                msg!("Instruction: Resolve Draw");
                Self::process_request_draw(program_id, accounts, true)
            }
            LotteryInstruction::SweepFunds => {
                msg!("Instruction: Sweep Funds");
                Self::process_sweep_funds(program_id, accounts)
            }
            LotteryInstruction::TransferAdmin => {
                msg!("Instruction: Transfer Admin");
                Self::process_transfer_admin(program_id, accounts)
            }
            LotteryInstruction::UpdateOracle { oracle_fee } => {
                msg!("Instruction: Update Oracle");
                Self::process_update_oracle(program_id, accounts, oracle_fee)
            }
        }
    }

    fn process_initialize_lottery(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        entry_fee: u64,
        oracle_fee: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let oracle_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        Self::require_signer(admin_info)?;
        Self::require_system_program(system_program_info)?;

        if entry_fee == 0 {
            return Err(reject(LotteryError::InvalidEntryFee));
        }

        let (expected_lottery, bump) = find_lottery_address(program_id);
        if *lottery_info.key != expected_lottery {
            msg!("Invalid lottery account address");
            return Err(ProgramError::InvalidArgument);
        }
        if lottery_info.owner == program_id {
            msg!("Lottery account is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        Self::create_lottery_account(
            program_id,
            admin_info,
            lottery_info,
            system_program_info,
            bump,
        )?;

        let lottery = Lottery::new(
            bump,
            *admin_info.key,
            *oracle_info.key,
            *treasury_info.key,
            entry_fee,
            oracle_fee,
        );
        Lottery::pack(lottery, &mut lottery_info.try_borrow_mut_data()?)?;

        msg!(
            "Lottery initialized: entry fee {} SOL, oracle {}",
            utils::lamports_to_sol(entry_fee),
            oracle_info.key
        );
        Ok(())
    }

    fn process_open_round(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        Self::require_signer(admin_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        let mut machine = RoundMachine::new(&mut lottery);
        machine.open(admin_info.key).map_err(reject)?;
        let events = machine.into_events();

        Self::commit(lottery_info, lottery, &events)
    }

    fn process_enter(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        paid_amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let participant_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        Self::require_signer(participant_info)?;
        Self::require_system_program(system_program_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        let mut custodian = LamportCustodian::new(lottery_info, Rent::get()?, accounts);
        let mut machine = RoundMachine::new(&mut lottery);
        let slot = machine
            .enter(participant_info.key, paid_amount, &mut custodian)
            .map_err(reject)?;
        let events = machine.into_events();

        msg!("Entry {} recorded for {}", slot, participant_info.key);
        Self::commit(lottery_info, lottery, &events)
    }

    fn process_close_round(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        Self::require_signer(admin_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        let mut machine = RoundMachine::new(&mut lottery);
        machine.close(admin_info.key).map_err(reject)?;
        let events = machine.into_events();

        Self::commit(lottery_info, lottery, &events)
    }

    /// RequestDraw and ResolveDraw share their accounts; `reissue` selects
    /// the recovery path that abandons a pending request first.
    fn process_request_draw(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        reissue: bool,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        Self::require_signer(admin_info)?;
        Self::require_system_program(system_program_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        if *treasury_info.key != lottery.oracle_treasury {
            msg!("Oracle treasury does not match the registered treasury");
            return Err(ProgramError::InvalidArgument);
        }

        let seed = utils::draw_seed(&Clock::get()?);
        let mut oracle = FeeOracle::new(
            lottery_info.key,
            admin_info,
            treasury_info,
            system_program_info,
            lottery.oracle_fee,
        );
        let mut machine = RoundMachine::new(&mut lottery);
        let request = if reissue {
            machine.resolve_draw(admin_info.key, &mut oracle, &seed)
        } else {
            machine.request_draw(admin_info.key, &mut oracle, &seed)
        };
        request.map_err(reject)?;
        let events = machine.into_events();

        Self::commit(lottery_info, lottery, &events)
    }

    fn process_fulfill_randomness(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: RequestId,
        random_value: [u8; 32],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        Self::require_signer(oracle_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        let mut custodian = LamportCustodian::new(lottery_info, Rent::get()?, accounts);
        let mut machine = RoundMachine::new(&mut lottery);
        let settlement = machine
            .on_fulfillment(oracle_info.key, &request_id, &random_value, &mut custodian)
            .map_err(reject)?;
        let events = machine.into_events();

        msg!(
            "Winner {} at slot {} receives {} SOL",
            settlement.winner,
            settlement.winner_index,
            utils::lamports_to_sol(settlement.amount)
        );
        Self::commit(lottery_info, lottery, &events)
    }

    fn process_sweep_funds(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let recipient_info = next_account_info(account_info_iter)?;

        Self::require_signer(admin_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        let mut custodian = LamportCustodian::new(lottery_info, Rent::get()?, accounts);
        let mut machine = RoundMachine::new(&mut lottery);
        machine
            .sweep_to(admin_info.key, recipient_info.key, &mut custodian)
            .map_err(reject)?;
        let events = machine.into_events();

        Self::commit(lottery_info, lottery, &events)
    }

    fn process_transfer_admin(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let new_admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        Self::require_signer(admin_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        let mut machine = RoundMachine::new(&mut lottery);
        machine
            .transfer_admin(admin_info.key, new_admin_info.key)
            .map_err(reject)?;
        let events = machine.into_events();

        Self::commit(lottery_info, lottery, &events)
    }

    fn process_update_oracle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        oracle_fee: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let oracle_info = next_account_info(account_info_iter)?;
        let treasury_info = next_account_info(account_info_iter)?;

        Self::require_signer(admin_info)?;
        let mut lottery = Self::load_lottery(program_id, lottery_info)?;

        let mut machine = RoundMachine::new(&mut lottery);
        machine
            .update_oracle(admin_info.key, oracle_info.key, treasury_info.key, oracle_fee)
            .map_err(reject)?;
        let events = machine.into_events();

        Self::commit(lottery_info, lottery, &events)
    }

    /// Create the lottery PDA. An address that already holds lamports cannot go
    /// through `create_account`, so it is topped up to rent exemption, then
    /// allocated and assigned in place.
    fn create_lottery_account<'a>(
        program_id: &Pubkey,
        admin_info: &AccountInfo<'a>,
        lottery_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        bump: u8,
    ) -> ProgramResult {
        let rent = Rent::get()?;
        let required = rent.minimum_balance(Lottery::LEN);
        let bump_seed = [bump];
        let signer_seeds: &[&[u8]] = &[LOTTERY_SEED, &bump_seed];

        if lottery_info.lamports() == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    admin_info.key,
                    lottery_info.key,
                    required,
                    Lottery::LEN as u64,
                    program_id,
                ),
                &[
                    admin_info.clone(),
                    lottery_info.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            );
        }

        msg!(
            "Lottery address already holds {} lamports",
            lottery_info.lamports()
        );
        let top_up = required.saturating_sub(lottery_info.lamports());
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(admin_info.key, lottery_info.key, top_up),
                &[
                    admin_info.clone(),
                    lottery_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(lottery_info.key, Lottery::LEN as u64),
            &[lottery_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(lottery_info.key, program_id),
            &[lottery_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )
    }

    fn require_signer(info: &AccountInfo) -> ProgramResult {
        if !info.is_signer {
            msg!("{} must sign the transaction", info.key);
            return Err(ProgramError::MissingRequiredSignature);
        }
        Ok(())
    }

    fn require_system_program(info: &AccountInfo) -> ProgramResult {
        if *info.key != system_program::id() {
            msg!("Expected the system program, got {}", info.key);
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(())
    }

    /// Read the lottery record after checking the account is the program's
    /// own lottery address
    fn load_lottery(
        program_id: &Pubkey,
        lottery_info: &AccountInfo,
    ) -> Result<Lottery, ProgramError> {
        if lottery_info.owner != program_id {
            msg!("Lottery account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let lottery = Lottery::unpack(&lottery_info.try_borrow_data()?)?;
        let expected =
            Pubkey::create_program_address(&[LOTTERY_SEED, &[lottery.bump]], program_id)?;
        if expected != *lottery_info.key {
            msg!("Invalid lottery account address");
            return Err(ProgramError::InvalidArgument);
        }
        Ok(lottery)
    }

    /// Persist the record, then publish the events of the operation
    fn commit(
        lottery_info: &AccountInfo,
        lottery: Lottery,
        events: &[LotteryEvent],
    ) -> ProgramResult {
        Lottery::pack(lottery, &mut lottery_info.try_borrow_mut_data()?)?;
        for event in events {
            event.log();
        }
        Ok(())
    }
}

fn reject(error: LotteryError) -> ProgramError {
    msg!("Error: {}", error);
    error.into()
}
