use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use std::convert::TryFrom;

use crate::constants::MAX_PARTICIPANTS;
use crate::lottery_error::LotteryError;

/// Identifier of a randomness request
pub type RequestId = [u8; 32];

/// Status of the current round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundStatus {
    /// No round open
    Inactive,
    /// Entries accepted
    Open,
    /// Entries sealed, waiting for the oracle
    AwaitingRandomness,
}

impl TryFrom<u8> for RoundStatus {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RoundStatus::Inactive),
            1 => Ok(RoundStatus::Open),
            2 => Ok(RoundStatus::AwaitingRandomness),
            _ => Err("Invalid round status"),
        }
    }
}

impl From<RoundStatus> for u8 {
    fn from(status: RoundStatus) -> Self {
        match status {
            RoundStatus::Inactive => 0,
            RoundStatus::Open => 1,
            RoundStatus::AwaitingRandomness => 2,
        }
    }
}

/// Ordered entries of the current round. The same key may hold several
/// slots; each slot is one unit of winning weight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticipantLedger {
    slots: Vec<Pubkey>,
}

impl ParticipantLedger {
    /// Append a participant, returning the slot it occupies
    pub fn record(&mut self, participant: Pubkey) -> Result<usize, LotteryError> {
        if self.is_full() {
            return Err(LotteryError::LedgerFull);
        }
        self.slots.push(participant);
        Ok(self.slots.len() - 1)
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= MAX_PARTICIPANTS
    }

    pub fn at(&self, index: usize) -> Option<&Pubkey> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pubkey> {
        self.slots.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Lottery account data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lottery {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Bump seed of the lottery PDA
    pub bump: u8,
    /// Admin authority gating round management
    pub admin: Pubkey,
    /// Oracle authority allowed to deliver randomness
    pub oracle: Pubkey,
    /// Account receiving the oracle fee
    pub oracle_treasury: Pubkey,
    /// Fee in lamports paid to the oracle per request
    pub oracle_fee: u64,
    /// Fixed price of one entry in lamports
    pub entry_fee: u64,
    /// Status of the current round
    pub status: RoundStatus,
    /// The single in-flight randomness request, if any
    pub pending_request: Option<RequestId>,
    /// Number of randomness requests issued so far
    pub request_nonce: u64,
    /// Entries of the current round
    pub participants: ParticipantLedger,
}

impl Lottery {
    pub fn new(
        bump: u8,
        admin: Pubkey,
        oracle: Pubkey,
        oracle_treasury: Pubkey,
        entry_fee: u64,
        oracle_fee: u64,
    ) -> Self {
        Self {
            is_initialized: true,
            bump,
            admin,
            oracle,
            oracle_treasury,
            oracle_fee,
            entry_fee,
            status: RoundStatus::Inactive,
            pending_request: None,
            request_nonce: 0,
            participants: ParticipantLedger::default(),
        }
    }
}

impl Sealed for Lottery {}

impl IsInitialized for Lottery {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

const HEADER_LEN: usize = 1 + 1 + 32 + 32 + 32 + 8 + 8 + 1 + 1 + 32 + 8 + 4;
const LEDGER_LEN: usize = MAX_PARTICIPANTS * 32;

impl Pack for Lottery {
    const LEN: usize = HEADER_LEN + LEDGER_LEN;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Lottery::LEN];
        let (
            is_initialized,
            bump,
            admin,
            oracle,
            oracle_treasury,
            oracle_fee,
            entry_fee,
            status,
            has_pending_request,
            pending_request,
            request_nonce,
            participant_count,
            ledger,
        ) = array_refs![src, 1, 1, 32, 32, 32, 8, 8, 1, 1, 32, 8, 4, LEDGER_LEN];

        let status =
            RoundStatus::try_from(status[0]).map_err(|_| ProgramError::InvalidAccountData)?;

        let participant_count = u32::from_le_bytes(*participant_count) as usize;
        if participant_count > MAX_PARTICIPANTS {
            return Err(ProgramError::InvalidAccountData);
        }
        let slots = ledger
            .chunks_exact(32)
            .take(participant_count)
            .map(|slot| Pubkey::new_from_array(*array_ref![slot, 0, 32]))
            .collect();

        Ok(Lottery {
            is_initialized: is_initialized[0] != 0,
            bump: bump[0],
            admin: Pubkey::new_from_array(*admin),
            oracle: Pubkey::new_from_array(*oracle),
            oracle_treasury: Pubkey::new_from_array(*oracle_treasury),
            oracle_fee: u64::from_le_bytes(*oracle_fee),
            entry_fee: u64::from_le_bytes(*entry_fee),
            status,
            pending_request: match has_pending_request[0] {
                0 => None,
                _ => Some(*pending_request),
            },
            request_nonce: u64::from_le_bytes(*request_nonce),
            participants: ParticipantLedger { slots },
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Lottery::LEN];
        let (
            is_initialized_dst,
            bump_dst,
            admin_dst,
            oracle_dst,
            oracle_treasury_dst,
            oracle_fee_dst,
            entry_fee_dst,
            status_dst,
            has_pending_request_dst,
            pending_request_dst,
            request_nonce_dst,
            participant_count_dst,
            ledger_dst,
        ) = mut_array_refs![dst, 1, 1, 32, 32, 32, 8, 8, 1, 1, 32, 8, 4, LEDGER_LEN];

        is_initialized_dst[0] = self.is_initialized as u8;
        bump_dst[0] = self.bump;
        admin_dst.copy_from_slice(self.admin.as_ref());
        oracle_dst.copy_from_slice(self.oracle.as_ref());
        oracle_treasury_dst.copy_from_slice(self.oracle_treasury.as_ref());
        *oracle_fee_dst = self.oracle_fee.to_le_bytes();
        *entry_fee_dst = self.entry_fee.to_le_bytes();
        status_dst[0] = self.status.into();
        match self.pending_request {
            Some(request_id) => {
                has_pending_request_dst[0] = 1;
                *pending_request_dst = request_id;
            }
            None => {
                has_pending_request_dst[0] = 0;
                *pending_request_dst = [0u8; 32];
            }
        }
        *request_nonce_dst = self.request_nonce.to_le_bytes();
        *participant_count_dst = (self.participants.count() as u32).to_le_bytes();
        ledger_dst.fill(0);
        for (slot, participant) in ledger_dst
            .chunks_exact_mut(32)
            .zip(self.participants.iter())
        {
            slot.copy_from_slice(participant.as_ref());
        }
    }
}
