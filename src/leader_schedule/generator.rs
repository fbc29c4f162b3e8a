//! Deterministic epoch schedule generation.
//!
//! The PRNG choice is part of the cross-validator wire contract (spec's
//! Determinism Note): this implementation pins `rand_chacha::ChaCha8Rng`,
//! seeded from the epoch number, matching the scheme the teacher's own
//! `leader_tracker` doc comments describe as "the Agave algorithm".

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::types::{Epoch, Pubkey, Slot, StakeEntry};

#[derive(Debug, thiserror::Error)]
pub enum LeaderScheduleError {
    #[error("total stake is zero, cannot derive a proportional schedule")]
    NoStake,
}

/// An immutable, fully materialized per-epoch leader assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochSchedule {
    pub epoch: Epoch,
    pub first_slot: Slot,
    pub last_slot: Slot,
    pub slot_leaders: Vec<Pubkey>,
}

fn seed_for_epoch(epoch: Epoch) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[0..8].copy_from_slice(&epoch.to_le_bytes());
    seed
}

/// Generates the leader schedule for `epoch` given `stakes`, byte-identical
/// for any permutation of `stakes` carrying the same (pubkey, stake) pairs
/// (property P8) — inputs are canonicalized by sorting on pubkey before the
/// seeded shuffle runs.
pub fn generate(
    epoch: Epoch,
    first_slot: Slot,
    slots_per_epoch: u64,
    stakes: &[StakeEntry],
) -> Result<EpochSchedule, LeaderScheduleError> {
    let total_stake: u128 = stakes.iter().map(|s| s.stake as u128).sum();
    if total_stake == 0 {
        return Err(LeaderScheduleError::NoStake);
    }

    let mut canonical = stakes.to_vec();
    canonical.sort_unstable_by(|a, b| a.pubkey.cmp(&b.pubkey));

    let mut rng = ChaCha8Rng::from_seed(seed_for_epoch(epoch));
    let mut shuffled = canonical.clone();
    shuffled.shuffle(&mut rng);

    let mut slot_leaders = Vec::with_capacity(slots_per_epoch as usize);
    for validator in &shuffled {
        if slot_leaders.len() as u64 >= slots_per_epoch {
            break;
        }
        let remaining = slots_per_epoch - slot_leaders.len() as u64;
        let proportional = (validator.stake as u128 * slots_per_epoch as u128 / total_stake) as u64;
        let count = (proportional + 1).min(remaining);
        for _ in 0..count {
            slot_leaders.push(validator.pubkey);
        }
    }

    // The `+1` flooring can under-fill; top off uniformly from the same
    // continuing PRNG state.
    while (slot_leaders.len() as u64) < slots_per_epoch {
        let pick = rng.gen_range(0..shuffled.len());
        slot_leaders.push(shuffled[pick].pubkey);
    }

    Ok(EpochSchedule {
        epoch,
        first_slot,
        last_slot: first_slot + slots_per_epoch - 1,
        slot_leaders,
    })
}
