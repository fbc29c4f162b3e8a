//! Block-production side of PoH: advances the hash chain and accumulates entries.

use crate::poh::entry::{fold_mixin, sha256_once, PohEntry};
use crate::types::{Hash, Slot};

/// Accumulates PoH entries for the slot currently being produced.
#[derive(Debug)]
pub struct PohRecorder {
    current_hash: Hash,
    hashes_since_record: u64,
    hashes_per_tick: u64,
    slot: Slot,
    tick: u64,
    ticks_per_slot: u64,
    entries: Vec<PohEntry>,
}

impl PohRecorder {
    pub fn new(start_hash: Hash, slot: Slot, hashes_per_tick: u64, ticks_per_slot: u64) -> Self {
        Self {
            current_hash: start_hash,
            hashes_since_record: 0,
            hashes_per_tick,
            slot,
            tick: 0,
            ticks_per_slot,
            entries: Vec::new(),
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn current_hash(&self) -> Hash {
        self.current_hash
    }

    /// Advances the chain by one SHA-256 step.
    pub fn hash(&mut self) {
        self.current_hash = sha256_once(&self.current_hash);
        self.hashes_since_record += 1;
    }

    /// Emits a tickless entry once `hashes_per_tick` steps have accumulated
    /// since the last record, resetting the counter and incrementing `tick`.
    pub fn record_tick(&mut self) -> Option<PohEntry> {
        if self.hashes_since_record < self.hashes_per_tick {
            return None;
        }
        let entry = PohEntry {
            num_hashes: self.hashes_since_record,
            hash: self.current_hash,
            mixin: None,
        };
        self.hashes_since_record = 0;
        self.tick += 1;
        self.entries.push(entry);
        Some(entry)
    }

    /// Folds `mixin` into the chain and emits an entry carrying it.
    pub fn record_mixin(&mut self, mixin: Hash) -> PohEntry {
        self.current_hash = fold_mixin(&self.current_hash, &mixin);
        let entry = PohEntry {
            num_hashes: self.hashes_since_record + 1,
            hash: self.current_hash,
            mixin: Some(mixin),
        };
        self.hashes_since_record = 0;
        self.entries.push(entry);
        entry
    }

    pub fn is_slot_complete(&self) -> bool {
        self.tick >= self.ticks_per_slot
    }

    /// Advances to the next slot, resetting the tick counter. Does not clear
    /// accumulated entries; callers drain those separately.
    pub fn advance_slot(&mut self) {
        self.slot += 1;
        self.tick = 0;
    }

    /// Yields ownership of the accumulated entries, clearing the buffer.
    pub fn drain_entries(&mut self) -> Vec<PohEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tick_waits_for_hashes_per_tick() {
        let mut recorder = PohRecorder::new([0u8; 32], 0, 3, 2);
        recorder.hash();
        recorder.hash();
        assert!(recorder.record_tick().is_none());
        recorder.hash();
        assert!(recorder.record_tick().is_some());
        assert_eq!(recorder.tick(), 1);
    }

    #[test]
    fn slot_completion_and_advance() {
        let mut recorder = PohRecorder::new([0u8; 32], 0, 1, 2);
        recorder.hash();
        recorder.record_tick();
        recorder.hash();
        recorder.record_tick();
        assert!(recorder.is_slot_complete());

        recorder.advance_slot();
        assert_eq!(recorder.slot(), 1);
        assert_eq!(recorder.tick(), 0);
    }

    #[test]
    fn drain_entries_clears_buffer() {
        let mut recorder = PohRecorder::new([0u8; 32], 0, 1, 1);
        recorder.hash();
        recorder.record_tick();
        let drained = recorder.drain_entries();
        assert_eq!(drained.len(), 1);
        assert!(recorder.drain_entries().is_empty());
    }

    #[test]
    fn record_mixin_produces_entry_with_mixin() {
        let mut recorder = PohRecorder::new([0u8; 32], 0, 100, 1);
        let mixin = [9u8; 32];
        let entry = recorder.record_mixin(mixin);
        assert_eq!(entry.mixin, Some(mixin));
        assert_eq!(entry.hash, recorder.current_hash());
    }
}
