// Randomness oracle integration for the lottery program
use solana_program::{
    account_info::AccountInfo, hash::hashv, msg, program::invoke, pubkey::Pubkey,
    system_instruction,
};

use crate::constants::REQUEST_DOMAIN;
use crate::lottery_error::LotteryError;
use crate::lottery_state::{Lottery, RequestId};

/// Outbound half of the oracle protocol. The inbound half is the
/// `FulfillRandomness` instruction, which arrives at some later time and is
/// tied to its request only through the returned id.
pub trait RandomnessOracle {
    /// Issue request number `nonce` with the given key material
    fn request(&mut self, nonce: u64, seed: &[u8]) -> Result<RequestId, LotteryError>;
}

/// Oracle client that pays the per-request fee from the requesting admin to
/// the oracle treasury. The oracle picks the request up from the program log.
pub struct FeeOracle<'a, 'info> {
    lottery: &'a Pubkey,
    payer: &'a AccountInfo<'info>,
    treasury: &'a AccountInfo<'info>,
    system_program: &'a AccountInfo<'info>,
    fee: u64,
}

impl<'a, 'info> FeeOracle<'a, 'info> {
    pub fn new(
        lottery: &'a Pubkey,
        payer: &'a AccountInfo<'info>,
        treasury: &'a AccountInfo<'info>,
        system_program: &'a AccountInfo<'info>,
        fee: u64,
    ) -> Self {
        Self {
            lottery,
            payer,
            treasury,
            system_program,
            fee,
        }
    }
}

impl<'a, 'info> RandomnessOracle for FeeOracle<'a, 'info> {
    fn request(&mut self, nonce: u64, seed: &[u8]) -> Result<RequestId, LotteryError> {
        if self.payer.lamports() < self.fee {
            msg!(
                "Oracle fee of {} lamports exceeds payer balance of {} lamports",
                self.fee,
                self.payer.lamports()
            );
            return Err(LotteryError::InsufficientOracleFunding);
        }

        if self.fee > 0 {
            invoke(
                &system_instruction::transfer(self.payer.key, self.treasury.key, self.fee),
                &[
                    self.payer.clone(),
                    self.treasury.clone(),
                    self.system_program.clone(),
                ],
            )
            .map_err(|err| {
                msg!("Oracle fee transfer to {} failed: {}", self.treasury.key, err);
                LotteryError::TransferFailure
            })?;
        }

        Ok(derive_request_id(self.lottery, nonce, seed))
    }
}

/// Request ids are unique per lottery account and request number
pub fn derive_request_id(lottery: &Pubkey, nonce: u64, seed: &[u8]) -> RequestId {
    hashv(&[REQUEST_DOMAIN, lottery.as_ref(), &nonce.to_le_bytes(), seed]).to_bytes()
}

/// Issue a randomness request for `lottery` and record it as pending.
/// Nothing is recorded when the oracle rejects the request.
pub fn request_randomness<O: RandomnessOracle + ?Sized>(
    lottery: &mut Lottery,
    oracle: &mut O,
    seed: &[u8],
) -> Result<RequestId, LotteryError> {
    if lottery.pending_request.is_some() {
        return Err(LotteryError::RequestAlreadyOutstanding);
    }

    let nonce = lottery
        .request_nonce
        .checked_add(1)
        .ok_or(LotteryError::Overflow)?;
    let request_id = oracle.request(nonce, seed)?;

    lottery.request_nonce = nonce;
    lottery.pending_request = Some(request_id);
    Ok(request_id)
}

/// Winner slot for a fulfilled request: `random_value mod count`, reading the
/// 32 random bytes as one big-endian 256-bit integer.
pub fn winner_index(random_value: &[u8; 32], count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }

    let modulus = count as u128;
    let remainder = random_value
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus);
    Some(remainder as u64)
}
