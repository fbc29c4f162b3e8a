//! Thread-safe per-epoch schedule storage and lookup.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::leader_schedule::generator::{generate, EpochSchedule, LeaderScheduleError};
use crate::types::{Epoch, Pubkey, Slot, StakeEntry};

/// Caches immutable [`EpochSchedule`]s behind an exclusive lock. Lookups copy
/// only the looked-up pubkey out, so callers never hold the lock.
#[derive(Debug, Default)]
pub struct LeaderScheduleCache {
    slots_per_epoch: u64,
    schedules: RwLock<HashMap<Epoch, EpochSchedule>>,
}

impl LeaderScheduleCache {
    pub fn new(slots_per_epoch: u64) -> Self {
        Self {
            slots_per_epoch,
            schedules: RwLock::new(HashMap::new()),
        }
    }

    fn epoch_of(&self, slot: Slot) -> Epoch {
        slot / self.slots_per_epoch
    }

    /// Write-side operation: generates and inserts the schedule for `epoch`
    /// if absent. `get_slot_leader` never generates on its own.
    pub fn ensure_schedule(
        &self,
        epoch: Epoch,
        stakes: &[StakeEntry],
    ) -> Result<(), LeaderScheduleError> {
        let mut schedules = self.schedules.write().expect("schedule cache lock poisoned");
        if schedules.contains_key(&epoch) {
            return Ok(());
        }
        let first_slot = epoch * self.slots_per_epoch;
        let schedule = generate(epoch, first_slot, self.slots_per_epoch, stakes)?;
        schedules.insert(epoch, schedule);
        Ok(())
    }

    /// O(1) lookup; returns `None` if that epoch's schedule hasn't been
    /// generated yet.
    pub fn get_slot_leader(&self, slot: Slot) -> Option<Pubkey> {
        let epoch = self.epoch_of(slot);
        let schedules = self.schedules.write().expect("schedule cache lock poisoned");
        let schedule = schedules.get(&epoch)?;
        let index = (slot - schedule.first_slot) as usize;
        schedule.slot_leaders.get(index).copied()
    }

    /// Drops schedules for epochs more than one epoch behind `current_root_epoch`.
    pub fn prune(&self, current_root_epoch: Epoch) {
        let mut schedules = self.schedules.write().expect("schedule cache lock poisoned");
        schedules.retain(|&epoch, _| epoch + 1 >= current_root_epoch);
    }
}
