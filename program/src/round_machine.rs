// Round lifecycle: Inactive -> Open -> AwaitingRandomness -> (settled) Inactive
use solana_program::pubkey::Pubkey;

use crate::custodian::FundsCustodian;
use crate::lottery_error::LotteryError;
use crate::lottery_event::LotteryEvent;
use crate::lottery_state::{Lottery, RequestId, RoundStatus};
use crate::vrf::{self, RandomnessOracle};

/// Authorization gate for the administrative operations
pub trait AdminControl {
    fn authorize(&self, caller: &Pubkey) -> bool;
}

impl AdminControl for Lottery {
    fn authorize(&self, caller: &Pubkey) -> bool {
        self.admin == *caller
    }
}

/// Outcome of a settled round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub winner_index: u64,
    pub winner: Pubkey,
    pub amount: u64,
}

/// Drives the singleton round held in `Lottery`.
///
/// Every operation either applies all of its effects or none of them: the
/// record and the event log are restored when an operation fails. Operations
/// run under a busy flag, so an operation entered while another is still
/// running fails with `ReentrantCall`.
pub struct RoundMachine<'l> {
    lottery: &'l mut Lottery,
    busy: bool,
    events: Vec<LotteryEvent>,
}

impl<'l> RoundMachine<'l> {
    pub fn new(lottery: &'l mut Lottery) -> Self {
        Self {
            lottery,
            busy: false,
            events: Vec::new(),
        }
    }

    pub fn lottery(&self) -> &Lottery {
        self.lottery
    }

    pub fn events(&self) -> &[LotteryEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<LotteryEvent> {
        self.events
    }

    fn guarded<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, LotteryError>,
    ) -> Result<T, LotteryError> {
        if self.busy {
            return Err(LotteryError::ReentrantCall);
        }
        self.busy = true;

        let snapshot = self.lottery.clone();
        let logged = self.events.len();
        let result = op(self);
        if result.is_err() {
            *self.lottery = snapshot;
            self.events.truncate(logged);
        }

        self.busy = false;
        result
    }

    fn ensure_admin(&self, caller: &Pubkey) -> Result<(), LotteryError> {
        if !self.lottery.authorize(caller) {
            return Err(LotteryError::Unauthorized);
        }
        Ok(())
    }

    /// Start a new round with an empty ledger
    pub fn open(&mut self, caller: &Pubkey) -> Result<(), LotteryError> {
        self.guarded(|machine| {
            machine.ensure_admin(caller)?;
            if machine.lottery.status != RoundStatus::Inactive {
                return Err(LotteryError::RoundAlreadyActive);
            }

            machine.lottery.participants.clear();
            machine.lottery.status = RoundStatus::Open;
            machine.events.push(LotteryEvent::RoundOpened);
            Ok(())
        })
    }

    /// Take one entry: deposit the fee, then record the participant.
    /// Returns the ledger slot of the entry.
    pub fn enter<C: FundsCustodian + ?Sized>(
        &mut self,
        participant: &Pubkey,
        paid_amount: u64,
        custodian: &mut C,
    ) -> Result<usize, LotteryError> {
        self.guarded(|machine| {
            if machine.lottery.status != RoundStatus::Open {
                return Err(LotteryError::RoundNotOpen);
            }
            if paid_amount != machine.lottery.entry_fee {
                return Err(LotteryError::IncorrectFee);
            }
            if machine.lottery.participants.is_full() {
                return Err(LotteryError::LedgerFull);
            }

            custodian.deposit(participant, paid_amount)?;
            let slot = machine.lottery.participants.record(*participant)?;

            machine.events.push(LotteryEvent::EntryRecorded {
                participant: *participant,
                slot: slot as u64,
                pool: custodian.balance(),
            });
            Ok(slot)
        })
    }

    /// Seal the ledger. The randomness request is a separate step.
    pub fn close(&mut self, caller: &Pubkey) -> Result<(), LotteryError> {
        self.guarded(|machine| {
            machine.ensure_admin(caller)?;
            if machine.lottery.status != RoundStatus::Open {
                return Err(LotteryError::RoundNotOpen);
            }

            machine.lottery.status = RoundStatus::AwaitingRandomness;
            machine.events.push(LotteryEvent::RoundClosed {
                entries: machine.lottery.participants.count() as u64,
            });
            Ok(())
        })
    }

    pub fn request_draw<O: RandomnessOracle + ?Sized>(
        &mut self,
        caller: &Pubkey,
        oracle: &mut O,
        seed: &[u8],
    ) -> Result<RequestId, LotteryError> {
        self.guarded(|machine| {
            machine.ensure_admin(caller)?;
            if machine.lottery.status != RoundStatus::AwaitingRandomness {
                return Err(LotteryError::RoundNotClosed);
            }
            if machine.lottery.participants.is_empty() {
                return Err(LotteryError::NoParticipants);
            }

            let request_id = vrf::request_randomness(machine.lottery, oracle, seed)?;
            machine.events.push(LotteryEvent::RandomnessRequested {
                request_id,
                nonce: machine.lottery.request_nonce,
            });
            Ok(request_id)
        })
    }

    /// Deliver randomness for the pending request and settle the round
    pub fn on_fulfillment<C: FundsCustodian + ?Sized>(
        &mut self,
        caller: &Pubkey,
        request_id: &RequestId,
        random_value: &[u8; 32],
        custodian: &mut C,
    ) -> Result<Settlement, LotteryError> {
        self.guarded(|machine| {
            if machine.lottery.oracle != *caller {
                return Err(LotteryError::UnauthorizedOracle);
            }
            if machine.lottery.pending_request != Some(*request_id) {
                return Err(LotteryError::StaleOrUnknownRequest);
            }

            machine.settle(request_id, random_value, custodian)
        })
    }

    fn settle<C: FundsCustodian + ?Sized>(
        &mut self,
        request_id: &RequestId,
        random_value: &[u8; 32],
        custodian: &mut C,
    ) -> Result<Settlement, LotteryError> {
        let entries = self.lottery.participants.count() as u64;
        let winner_index =
            vrf::winner_index(random_value, entries).ok_or(LotteryError::NoParticipants)?;
        let winner = *self
            .lottery
            .participants
            .at(winner_index as usize)
            .ok_or(LotteryError::NoParticipants)?;

        // Reset before the value leaves custody; a failed payout rolls the
        // reset back through guarded().
        self.lottery.participants.clear();
        self.lottery.pending_request = None;
        self.lottery.status = RoundStatus::Inactive;

        let amount = custodian.payout(&winner)?;

        self.events.push(LotteryEvent::WinnerPaid {
            request_id: *request_id,
            winner_index,
            winner,
            amount,
        });
        Ok(Settlement {
            winner_index,
            winner,
            amount,
        })
    }

    /// Admin recovery for a round stuck awaiting randomness: abandon the
    /// pending request, if any, and request fresh randomness for the same
    /// ledger.
    pub fn resolve_draw<O: RandomnessOracle + ?Sized>(
        &mut self,
        caller: &Pubkey,
        oracle: &mut O,
        seed: &[u8],
    ) -> Result<RequestId, LotteryError> {
        self.guarded(|machine| {
            machine.ensure_admin(caller)?;
            if machine.lottery.status != RoundStatus::AwaitingRandomness {
                return Err(LotteryError::RoundNotClosed);
            }
            if machine.lottery.participants.is_empty() {
                return Err(LotteryError::NoParticipants);
            }

            let abandoned = machine.lottery.pending_request.take();
            machine.events.push(LotteryEvent::DrawReissued { abandoned });

            let request_id = vrf::request_randomness(machine.lottery, oracle, seed)?;
            machine.events.push(LotteryEvent::RandomnessRequested {
                request_id,
                nonce: machine.lottery.request_nonce,
            });
            Ok(request_id)
        })
    }

    /// Emergency escape: move the whole custodial balance to `recipient`.
    /// A round in progress is voided so the pool and the ledger stay in step.
    pub fn sweep_to<C: FundsCustodian + ?Sized>(
        &mut self,
        caller: &Pubkey,
        recipient: &Pubkey,
        custodian: &mut C,
    ) -> Result<u64, LotteryError> {
        self.guarded(|machine| {
            machine.ensure_admin(caller)?;

            if machine.lottery.status != RoundStatus::Inactive {
                let entries = machine.lottery.participants.count() as u64;
                machine.lottery.participants.clear();
                machine.lottery.pending_request = None;
                machine.lottery.status = RoundStatus::Inactive;
                machine.events.push(LotteryEvent::RoundVoided { entries });
            }

            let amount = custodian.sweep_to(recipient)?;
            machine.events.push(LotteryEvent::FundsSwept {
                recipient: *recipient,
                amount,
            });
            Ok(amount)
        })
    }

    pub fn transfer_admin(
        &mut self,
        caller: &Pubkey,
        new_admin: &Pubkey,
    ) -> Result<(), LotteryError> {
        self.guarded(|machine| {
            machine.ensure_admin(caller)?;

            let previous = machine.lottery.admin;
            machine.lottery.admin = *new_admin;
            machine.events.push(LotteryEvent::AdminTransferred {
                previous,
                admin: *new_admin,
            });
            Ok(())
        })
    }

    /// Re-register the oracle. Not allowed while a request is pending, since
    /// the pending fulfillment is authenticated against the registered oracle.
    pub fn update_oracle(
        &mut self,
        caller: &Pubkey,
        oracle: &Pubkey,
        treasury: &Pubkey,
        fee: u64,
    ) -> Result<(), LotteryError> {
        self.guarded(|machine| {
            machine.ensure_admin(caller)?;
            if machine.lottery.pending_request.is_some() {
                return Err(LotteryError::RequestAlreadyOutstanding);
            }

            machine.lottery.oracle = *oracle;
            machine.lottery.oracle_treasury = *treasury;
            machine.lottery.oracle_fee = fee;
            machine.events.push(LotteryEvent::OracleUpdated {
                oracle: *oracle,
                treasury: *treasury,
                fee,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_PARTICIPANTS;
    use std::collections::HashMap;

    const SEED: [u8; 16] = [3u8; 16];

    #[derive(Default)]
    struct MemoryCustodian {
        balance: u64,
        paid: HashMap<Pubkey, u64>,
        unpayable: Vec<Pubkey>,
    }

    impl MemoryCustodian {
        fn release(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError> {
            if self.unpayable.contains(recipient) {
                return Err(LotteryError::TransferFailure);
            }
            let amount = std::mem::take(&mut self.balance);
            *self.paid.entry(*recipient).or_default() += amount;
            Ok(amount)
        }
    }

    impl FundsCustodian for MemoryCustodian {
        fn balance(&self) -> u64 {
            self.balance
        }

        fn deposit(&mut self, _from: &Pubkey, amount: u64) -> Result<(), LotteryError> {
            self.balance += amount;
            Ok(())
        }

        fn payout(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError> {
            self.release(recipient)
        }

        fn sweep_to(&mut self, recipient: &Pubkey) -> Result<u64, LotteryError> {
            self.release(recipient)
        }
    }

    struct StubOracle {
        funded: bool,
        issued: Vec<RequestId>,
    }

    impl StubOracle {
        fn funded() -> Self {
            Self {
                funded: true,
                issued: Vec::new(),
            }
        }
    }

    impl RandomnessOracle for StubOracle {
        fn request(&mut self, nonce: u64, seed: &[u8]) -> Result<RequestId, LotteryError> {
            if !self.funded {
                return Err(LotteryError::InsufficientOracleFunding);
            }
            let request_id = vrf::derive_request_id(&Pubkey::default(), nonce, seed);
            self.issued.push(request_id);
            Ok(request_id)
        }
    }

    struct Fixture {
        lottery: Lottery,
        admin: Pubkey,
        oracle: Pubkey,
    }

    fn fixture(entry_fee: u64) -> Fixture {
        let admin = Pubkey::new_unique();
        let oracle = Pubkey::new_unique();
        Fixture {
            lottery: Lottery::new(255, admin, oracle, Pubkey::new_unique(), entry_fee, 0),
            admin,
            oracle,
        }
    }

    fn value_of(n: u64) -> [u8; 32] {
        let mut value = [0u8; 32];
        value[24..].copy_from_slice(&n.to_be_bytes());
        value
    }

    /// Opens a round, enters `players` in order and closes it
    fn closed_round(
        machine: &mut RoundMachine,
        admin: &Pubkey,
        players: &[Pubkey],
        custodian: &mut MemoryCustodian,
    ) {
        let fee = machine.lottery().entry_fee;
        machine.open(admin).unwrap();
        for player in players {
            machine.enter(player, fee, custodian).unwrap();
        }
        machine.close(admin).unwrap();
    }

    #[test]
    fn pool_tracks_fee_times_entries() {
        let mut f = fixture(5);
        let mut custodian = MemoryCustodian::default();
        let mut machine = RoundMachine::new(&mut f.lottery);
        machine.open(&f.admin).unwrap();

        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        for player in [a, b, a, a] {
            machine.enter(&player, 5, &mut custodian).unwrap();
            let entries = machine.lottery().participants.count() as u64;
            assert_eq!(custodian.balance(), 5 * entries);
        }

        let ledger: Vec<Pubkey> = machine.lottery().participants.iter().copied().collect();
        assert_eq!(ledger, vec![a, b, a, a]);
    }

    #[test]
    fn rejected_entries_leave_no_trace() {
        let mut f = fixture(5);
        let mut custodian = MemoryCustodian::default();
        let mut machine = RoundMachine::new(&mut f.lottery);
        let player = Pubkey::new_unique();

        assert_eq!(
            machine.enter(&player, 5, &mut custodian),
            Err(LotteryError::RoundNotOpen)
        );

        machine.open(&f.admin).unwrap();
        for wrong_fee in [0, 4, 6, u64::MAX] {
            assert_eq!(
                machine.enter(&player, wrong_fee, &mut custodian),
                Err(LotteryError::IncorrectFee)
            );
        }

        machine.close(&f.admin).unwrap();
        assert_eq!(
            machine.enter(&player, 5, &mut custodian),
            Err(LotteryError::RoundNotOpen)
        );

        assert!(machine.lottery().participants.is_empty());
        assert_eq!(custodian.balance(), 0);
        assert_eq!(
            machine.events(),
            &[LotteryEvent::RoundOpened, LotteryEvent::RoundClosed { entries: 0 }]
        );
    }

    #[test]
    fn full_ledger_takes_no_deposit() {
        let mut f = fixture(3);
        let mut custodian = MemoryCustodian::default();
        let mut machine = RoundMachine::new(&mut f.lottery);
        machine.open(&f.admin).unwrap();
        for _ in 0..MAX_PARTICIPANTS {
            machine
                .enter(&Pubkey::new_unique(), 3, &mut custodian)
                .unwrap();
        }
        let full_pool = 3 * MAX_PARTICIPANTS as u64;
        assert_eq!(custodian.balance(), full_pool);

        let logged = machine.events().len();
        assert_eq!(
            machine.enter(&Pubkey::new_unique(), 3, &mut custodian),
            Err(LotteryError::LedgerFull)
        );
        assert_eq!(custodian.balance(), full_pool);
        assert_eq!(machine.lottery().participants.count(), MAX_PARTICIPANTS);
        assert_eq!(machine.events().len(), logged);
    }

    #[test]
    fn admin_operations_require_authorization() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let outsider = Pubkey::new_unique();
        let mut machine = RoundMachine::new(&mut f.lottery);

        assert_eq!(machine.open(&outsider), Err(LotteryError::Unauthorized));
        machine.open(&f.admin).unwrap();
        machine.enter(&outsider, 1, &mut custodian).unwrap();
        assert_eq!(machine.close(&outsider), Err(LotteryError::Unauthorized));
        machine.close(&f.admin).unwrap();
        assert_eq!(
            machine.request_draw(&outsider, &mut oracle, &SEED),
            Err(LotteryError::Unauthorized)
        );
        assert_eq!(
            machine.sweep_to(&outsider, &outsider, &mut custodian),
            Err(LotteryError::Unauthorized)
        );
        assert_eq!(
            machine.transfer_admin(&outsider, &outsider),
            Err(LotteryError::Unauthorized)
        );
        assert_eq!(machine.lottery().status, RoundStatus::AwaitingRandomness);
        assert_eq!(custodian.balance(), 1);
        assert!(oracle.issued.is_empty());
    }

    #[test]
    fn open_twice_fails() {
        let mut f = fixture(1);
        let mut machine = RoundMachine::new(&mut f.lottery);
        machine.open(&f.admin).unwrap();
        assert_eq!(machine.open(&f.admin), Err(LotteryError::RoundAlreadyActive));
        assert_eq!(machine.lottery().status, RoundStatus::Open);
    }

    #[test]
    fn close_twice_keeps_round_awaiting_randomness() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut machine = RoundMachine::new(&mut f.lottery);
        closed_round(&mut machine, &f.admin, &[Pubkey::new_unique()], &mut custodian);

        let before = machine.lottery().clone();
        assert_eq!(machine.close(&f.admin), Err(LotteryError::RoundNotOpen));
        assert_eq!(machine.lottery(), &before);
        assert_eq!(machine.lottery().status, RoundStatus::AwaitingRandomness);
    }

    #[test]
    fn only_one_request_until_settlement() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        closed_round(&mut machine, &f.admin, &[Pubkey::new_unique()], &mut custodian);

        let request_id = machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();
        assert_eq!(
            machine.request_draw(&f.admin, &mut oracle, &SEED),
            Err(LotteryError::RequestAlreadyOutstanding)
        );
        assert_eq!(machine.lottery().pending_request, Some(request_id));
        assert_eq!(machine.lottery().request_nonce, 1);
        assert_eq!(oracle.issued, vec![request_id]);
    }

    #[test]
    fn request_draw_needs_a_closed_round_with_entries() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);

        assert_eq!(
            machine.request_draw(&f.admin, &mut oracle, &SEED),
            Err(LotteryError::RoundNotClosed)
        );
        machine.open(&f.admin).unwrap();
        machine
            .enter(&Pubkey::new_unique(), 1, &mut custodian)
            .unwrap();
        assert_eq!(
            machine.request_draw(&f.admin, &mut oracle, &SEED),
            Err(LotteryError::RoundNotClosed)
        );

        let mut empty = fixture(1);
        let mut machine = RoundMachine::new(&mut empty.lottery);
        closed_round(&mut machine, &empty.admin, &[], &mut custodian);
        assert_eq!(
            machine.request_draw(&empty.admin, &mut oracle, &SEED),
            Err(LotteryError::NoParticipants)
        );
        assert!(oracle.issued.is_empty());
    }

    #[test]
    fn unfunded_oracle_records_no_request() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle {
            funded: false,
            issued: Vec::new(),
        };
        let mut machine = RoundMachine::new(&mut f.lottery);
        closed_round(&mut machine, &f.admin, &[Pubkey::new_unique()], &mut custodian);

        let before = machine.lottery().clone();
        assert_eq!(
            machine.request_draw(&f.admin, &mut oracle, &SEED),
            Err(LotteryError::InsufficientOracleFunding)
        );
        assert_eq!(machine.lottery(), &before);
        assert_eq!(machine.lottery().request_nonce, 0);
    }

    #[test]
    fn mismatched_fulfillment_never_mutates() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        let players = [Pubkey::new_unique(), Pubkey::new_unique()];
        closed_round(&mut machine, &f.admin, &players, &mut custodian);
        let request_id = machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();

        let before = machine.lottery().clone();
        let logged = machine.events().len();
        let mut wrong_id = request_id;
        wrong_id[0] ^= 1;
        for random in [0, 1, 7, u64::MAX] {
            assert_eq!(
                machine.on_fulfillment(&f.oracle, &wrong_id, &value_of(random), &mut custodian),
                Err(LotteryError::StaleOrUnknownRequest)
            );
            assert_eq!(
                machine.on_fulfillment(&f.oracle, &[0u8; 32], &value_of(random), &mut custodian),
                Err(LotteryError::StaleOrUnknownRequest)
            );
        }

        assert_eq!(machine.lottery(), &before);
        assert_eq!(machine.events().len(), logged);
        assert_eq!(custodian.balance(), 2);
        assert!(custodian.paid.is_empty());
    }

    #[test]
    fn only_the_registered_oracle_can_fulfill() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        closed_round(&mut machine, &f.admin, &[Pubkey::new_unique()], &mut custodian);
        let request_id = machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();

        for impostor in [f.admin, Pubkey::new_unique()] {
            assert_eq!(
                machine.on_fulfillment(&impostor, &request_id, &value_of(0), &mut custodian),
                Err(LotteryError::UnauthorizedOracle)
            );
        }
        assert_eq!(machine.lottery().pending_request, Some(request_id));
    }

    #[test]
    fn seven_over_three_entries_pays_the_second() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        closed_round(&mut machine, &f.admin, &[a, b, c], &mut custodian);
        let request_id = machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();
        assert_eq!(custodian.balance(), 3);

        let settlement = machine
            .on_fulfillment(&f.oracle, &request_id, &value_of(7), &mut custodian)
            .unwrap();

        assert_eq!(
            settlement,
            Settlement {
                winner_index: 1,
                winner: b,
                amount: 3,
            }
        );
        assert_eq!(custodian.balance(), 0);
        assert_eq!(custodian.paid.get(&b), Some(&3));
        assert!(custodian.paid.get(&a).is_none());
        assert!(machine.lottery().participants.is_empty());
        assert_eq!(machine.lottery().pending_request, None);
        assert_eq!(machine.lottery().status, RoundStatus::Inactive);
        assert_eq!(
            machine.events().last(),
            Some(&LotteryEvent::WinnerPaid {
                request_id,
                winner_index: 1,
                winner: b,
                amount: 3,
            })
        );
    }

    #[test]
    fn settled_request_cannot_be_replayed() {
        let mut f = fixture(2);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        let players = [Pubkey::new_unique(), Pubkey::new_unique()];
        closed_round(&mut machine, &f.admin, &players, &mut custodian);
        let request_id = machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();
        machine
            .on_fulfillment(&f.oracle, &request_id, &value_of(0), &mut custodian)
            .unwrap();

        // next round already collecting entries when the replay arrives
        machine.open(&f.admin).unwrap();
        machine.enter(&players[1], 2, &mut custodian).unwrap();
        assert_eq!(
            machine.on_fulfillment(&f.oracle, &request_id, &value_of(0), &mut custodian),
            Err(LotteryError::StaleOrUnknownRequest)
        );
        assert_eq!(custodian.balance(), 2);
        assert_eq!(machine.lottery().participants.count(), 1);
        assert_eq!(custodian.paid.get(&players[0]), Some(&4));
    }

    #[test]
    fn failed_payout_holds_round_until_sweep() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        custodian.unpayable.push(b);
        closed_round(&mut machine, &f.admin, &[a, b, c], &mut custodian);
        let request_id = machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();

        let before = machine.lottery().clone();
        assert_eq!(
            machine.on_fulfillment(&f.oracle, &request_id, &value_of(7), &mut custodian),
            Err(LotteryError::TransferFailure)
        );
        assert_eq!(machine.lottery(), &before);
        assert_eq!(machine.lottery().status, RoundStatus::AwaitingRandomness);
        assert_eq!(machine.lottery().pending_request, Some(request_id));
        assert_eq!(custodian.balance(), 3);

        let treasury = Pubkey::new_unique();
        assert_eq!(machine.sweep_to(&f.admin, &treasury, &mut custodian), Ok(3));
        assert_eq!(custodian.balance(), 0);
        assert_eq!(custodian.paid.get(&treasury), Some(&3));
        assert_eq!(machine.lottery().status, RoundStatus::Inactive);
        assert!(machine.lottery().participants.is_empty());
        assert_eq!(machine.lottery().pending_request, None);
        assert_eq!(
            &machine.events()[machine.events().len() - 2..],
            &[
                LotteryEvent::RoundVoided { entries: 3 },
                LotteryEvent::FundsSwept {
                    recipient: treasury,
                    amount: 3,
                },
            ]
        );
    }

    #[test]
    fn failed_sweep_keeps_the_round() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut machine = RoundMachine::new(&mut f.lottery);
        let player = Pubkey::new_unique();
        closed_round(&mut machine, &f.admin, &[player], &mut custodian);

        let blocked = Pubkey::new_unique();
        custodian.unpayable.push(blocked);
        let before = machine.lottery().clone();
        assert_eq!(
            machine.sweep_to(&f.admin, &blocked, &mut custodian),
            Err(LotteryError::TransferFailure)
        );
        assert_eq!(machine.lottery(), &before);
        assert_eq!(custodian.balance(), 1);
    }

    #[test]
    fn resolve_draw_replaces_a_stuck_request() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        custodian.unpayable.push(b);
        closed_round(&mut machine, &f.admin, &[a, b], &mut custodian);
        let stuck = machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();
        assert_eq!(
            machine.on_fulfillment(&f.oracle, &stuck, &value_of(1), &mut custodian),
            Err(LotteryError::TransferFailure)
        );

        let fresh = machine.resolve_draw(&f.admin, &mut oracle, &SEED).unwrap();
        assert_ne!(fresh, stuck);
        assert_eq!(machine.lottery().pending_request, Some(fresh));
        assert_eq!(machine.lottery().request_nonce, 2);
        assert_eq!(
            machine.on_fulfillment(&f.oracle, &stuck, &value_of(0), &mut custodian),
            Err(LotteryError::StaleOrUnknownRequest)
        );

        let settlement = machine
            .on_fulfillment(&f.oracle, &fresh, &value_of(4), &mut custodian)
            .unwrap();
        assert_eq!(settlement.winner, a);
        assert_eq!(custodian.paid.get(&a), Some(&2));
        assert_eq!(machine.lottery().status, RoundStatus::Inactive);
    }

    #[test]
    fn resolve_draw_is_unreachable_outside_awaiting_randomness() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);

        assert_eq!(
            machine.resolve_draw(&f.admin, &mut oracle, &SEED),
            Err(LotteryError::RoundNotClosed)
        );
        machine.open(&f.admin).unwrap();
        machine
            .enter(&Pubkey::new_unique(), 1, &mut custodian)
            .unwrap();
        assert_eq!(
            machine.resolve_draw(&f.admin, &mut oracle, &SEED),
            Err(LotteryError::RoundNotClosed)
        );
        assert!(oracle.issued.is_empty());
    }

    #[test]
    fn nested_operation_is_rejected() {
        let mut f = fixture(1);
        let mut machine = RoundMachine::new(&mut f.lottery);
        machine.busy = true;

        let before = machine.lottery().clone();
        assert_eq!(machine.open(&f.admin), Err(LotteryError::ReentrantCall));
        assert_eq!(machine.lottery(), &before);
        assert!(machine.events().is_empty());

        machine.busy = false;
        assert_eq!(machine.open(&f.admin), Ok(()));
    }

    #[test]
    fn oracle_cannot_be_swapped_under_a_pending_request() {
        let mut f = fixture(1);
        let mut custodian = MemoryCustodian::default();
        let mut oracle = StubOracle::funded();
        let mut machine = RoundMachine::new(&mut f.lottery);
        closed_round(&mut machine, &f.admin, &[Pubkey::new_unique()], &mut custodian);
        machine.request_draw(&f.admin, &mut oracle, &SEED).unwrap();

        let new_oracle = Pubkey::new_unique();
        assert_eq!(
            machine.update_oracle(&f.admin, &new_oracle, &new_oracle, 10),
            Err(LotteryError::RequestAlreadyOutstanding)
        );
        assert_eq!(machine.lottery().oracle, f.oracle);
    }

    #[test]
    fn transferred_admin_takes_over() {
        let mut f = fixture(1);
        let successor = Pubkey::new_unique();
        let mut machine = RoundMachine::new(&mut f.lottery);

        machine.transfer_admin(&f.admin, &successor).unwrap();
        assert_eq!(machine.open(&f.admin), Err(LotteryError::Unauthorized));
        machine.open(&successor).unwrap();

        let oracle = Pubkey::new_unique();
        let treasury = Pubkey::new_unique();
        machine
            .update_oracle(&successor, &oracle, &treasury, 5_000)
            .unwrap();
        assert_eq!(machine.lottery().oracle, oracle);
        assert_eq!(machine.lottery().oracle_fee, 5_000);
    }
}
