// Custody of the pooled entry fees
use solana_program::{
    account_info::AccountInfo, msg, program::invoke, pubkey::Pubkey, rent::Rent,
    system_instruction, system_program,
};

use crate::lottery_error::LotteryError;

/// Holds and moves the pooled balance of the current round.
///
/// `payout` and `sweep_to` move the whole balance or nothing: when the
/// recipient cannot accept funds they fail with `TransferFailure` and the
/// balance stays where it was.
pub trait FundsCustodian {
    /// Lamports currently held for the pool
    fn balance(&self) -> u64;

    /// Move exactly `amount` from `from` into custody
    fn deposit(&mut self, from: &Pubkey, amount: u64) -> Result<(), LotteryError>;

    /// Transfer the entire balance to the round winner
    fn payout(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError>;

    /// Emergency escape: transfer the entire balance regardless of round state
    fn sweep_to(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError>;
}

/// Custodian backed by the lamports of the lottery account itself. Everything
/// above the account's rent-exempt reserve belongs to the pool.
pub struct LamportCustodian<'a, 'info> {
    vault: &'a AccountInfo<'info>,
    reserve: u64,
    rent: Rent,
    accounts: &'a [AccountInfo<'info>],
}

impl<'a, 'info> LamportCustodian<'a, 'info> {
    /// `accounts` are the instruction accounts; depositors and recipients are
    /// looked up among them by key.
    pub fn new(
        vault: &'a AccountInfo<'info>,
        rent: Rent,
        accounts: &'a [AccountInfo<'info>],
    ) -> Self {
        Self {
            vault,
            reserve: rent.minimum_balance(vault.data_len()),
            rent,
            accounts,
        }
    }

    fn find(&self, key: &Pubkey) -> Option<&'a AccountInfo<'info>> {
        self.accounts.iter().find(|info| info.key == key)
    }

    fn release_to(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError> {
        let recipient_info = self
            .find(recipient)
            .ok_or(LotteryError::AccountNotSupplied)?;
        if recipient_info.key == self.vault.key {
            msg!("Cannot pay the pool back into the lottery account");
            return Err(LotteryError::TransferFailure);
        }
        if !recipient_info.is_writable || recipient_info.executable {
            msg!("Recipient {} cannot receive lamports", recipient_info.key);
            return Err(LotteryError::TransferFailure);
        }

        let amount = self.balance();
        if amount == 0 {
            return Ok(0);
        }
        let credited = recipient_info
            .lamports()
            .checked_add(amount)
            .ok_or(LotteryError::Overflow)?;
        if !self.rent.is_exempt(credited, recipient_info.data_len()) {
            msg!(
                "Recipient {} would hold {} lamports, below the rent-exempt minimum",
                recipient_info.key,
                credited
            );
            return Err(LotteryError::TransferFailure);
        }

        let remaining = self
            .vault
            .lamports()
            .checked_sub(amount)
            .ok_or(LotteryError::InsufficientFunds)?;
        **self
            .vault
            .try_borrow_mut_lamports()
            .map_err(|_| LotteryError::TransferFailure)? = remaining;
        **recipient_info
            .try_borrow_mut_lamports()
            .map_err(|_| LotteryError::TransferFailure)? = credited;

        Ok(amount)
    }
}

impl<'a, 'info> FundsCustodian for LamportCustodian<'a, 'info> {
    fn balance(&self) -> u64 {
        self.vault.lamports().saturating_sub(self.reserve)
    }

    fn deposit(&mut self, from: &Pubkey, amount: u64) -> Result<(), LotteryError> {
        let from_info = self.find(from).ok_or(LotteryError::AccountNotSupplied)?;
        let system_program_info = self
            .find(&system_program::id())
            .ok_or(LotteryError::AccountNotSupplied)?;

        if from_info.lamports() < amount {
            msg!(
                "Insufficient funds: needed {} lamports, had {} lamports",
                amount,
                from_info.lamports()
            );
            return Err(LotteryError::InsufficientFunds);
        }

        invoke(
            &system_instruction::transfer(from_info.key, self.vault.key, amount),
            &[
                from_info.clone(),
                self.vault.clone(),
                system_program_info.clone(),
            ],
        )
        .map_err(|_| LotteryError::TransferFailure)
    }

    fn payout(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError> {
        self.release_to(recipient)
    }

    fn sweep_to(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError> {
        self.release_to(recipient)
    }
}
