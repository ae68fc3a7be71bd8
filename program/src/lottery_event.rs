use std::fmt;

use solana_program::{hash::Hash, msg, pubkey::Pubkey};

use crate::lottery_state::RequestId;

/// Observable lottery events, written to the program log in the order an
/// operation produced them
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LotteryEvent {
    RoundOpened,
    EntryRecorded {
        participant: Pubkey,
        slot: u64,
        pool: u64,
    },
    RoundClosed {
        entries: u64,
    },
    RandomnessRequested {
        request_id: RequestId,
        nonce: u64,
    },
    /// A pending request was abandoned by the admin recovery path
    DrawReissued {
        abandoned: Option<RequestId>,
    },
    WinnerPaid {
        request_id: RequestId,
        winner_index: u64,
        winner: Pubkey,
        amount: u64,
    },
    FundsSwept {
        recipient: Pubkey,
        amount: u64,
    },
    /// An unsettled round was discarded by the emergency sweep
    RoundVoided {
        entries: u64,
    },
    AdminTransferred {
        previous: Pubkey,
        admin: Pubkey,
    },
    OracleUpdated {
        oracle: Pubkey,
        treasury: Pubkey,
        fee: u64,
    },
}

impl LotteryEvent {
    pub fn log(&self) {
        msg!("Event: {}", self);
    }
}

fn request(id: &RequestId) -> Hash {
    Hash::new_from_array(*id)
}

impl fmt::Display for LotteryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LotteryEvent::RoundOpened => write!(f, "RoundOpened"),
            LotteryEvent::EntryRecorded {
                participant,
                slot,
                pool,
            } => write!(
                f,
                "EntryRecorded participant={} slot={} pool={}",
                participant, slot, pool
            ),
            LotteryEvent::RoundClosed { entries } => write!(f, "RoundClosed entries={}", entries),
            LotteryEvent::RandomnessRequested { request_id, nonce } => write!(
                f,
                "RandomnessRequested request_id={} nonce={}",
                request(request_id),
                nonce
            ),
            LotteryEvent::DrawReissued { abandoned } => match abandoned {
                Some(id) => write!(f, "DrawReissued abandoned={}", request(id)),
                None => write!(f, "DrawReissued abandoned=none"),
            },
            LotteryEvent::WinnerPaid {
                request_id,
                winner_index,
                winner,
                amount,
            } => write!(
                f,
                "WinnerPaid request_id={} winner_index={} winner={} amount={}",
                request(request_id),
                winner_index,
                winner,
                amount
            ),
            LotteryEvent::FundsSwept { recipient, amount } => {
                write!(f, "FundsSwept recipient={} amount={}", recipient, amount)
            }
            LotteryEvent::RoundVoided { entries } => write!(f, "RoundVoided entries={}", entries),
            LotteryEvent::AdminTransferred { previous, admin } => {
                write!(f, "AdminTransferred previous={} admin={}", previous, admin)
            }
            LotteryEvent::OracleUpdated {
                oracle,
                treasury,
                fee,
            } => write!(
                f,
                "OracleUpdated oracle={} treasury={} fee={}",
                oracle, treasury, fee
            ),
        }
    }
}
