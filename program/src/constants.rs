// Lottery Program - Constants

/// Seed of the singleton lottery account (program derived address)
pub const LOTTERY_SEED: &[u8] = b"lottery";

/// Ledger slots available per round. The ledger is stored inline in the
/// lottery account, so this bounds the account size.
pub const MAX_PARTICIPANTS: usize = 128;

/// Domain tag mixed into every randomness request id
pub const REQUEST_DOMAIN: &[u8] = b"lottery-draw";
