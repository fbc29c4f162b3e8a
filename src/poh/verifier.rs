//! Sequential (and optional parallel) verification of a PoH chain.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::poh::entry::{fold_mixin, hash_chain, PohEntry};
use crate::types::{Hash, Slot};

#[derive(Debug, thiserror::Error)]
pub enum ChainViolation {
    #[error("hash mismatch verifying an entry in slot {slot}")]
    InvalidHash { slot: Slot },
    #[error("entries for slot {got} do not follow current slot {current}")]
    InvalidSequence { current: Slot, got: Slot },
    #[error("slot {slot} has {got} ticks, expected {expected}")]
    TickMismatch { slot: Slot, expected: u64, got: u64 },
}

/// Breakdown of a single `verify_entry` call, matching spec §4.1's contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub valid: bool,
    pub invalid_hash: bool,
    pub invalid_sequence: bool,
    pub tick_mismatch: bool,
}

impl VerifyOutcome {
    fn valid() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }
}

/// Hot-path PoH counters. Relaxed ordering only — readers tolerate slight skew
/// between `entries_verified` and `hashes_computed` (see Design Notes).
#[derive(Debug, Default)]
pub struct PohStats {
    entries_verified: AtomicU64,
    hashes_computed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PohStatsSnapshot {
    pub entries_verified: u64,
    pub hashes_computed: u64,
}

impl PohStats {
    pub fn snapshot(&self) -> PohStatsSnapshot {
        PohStatsSnapshot {
            entries_verified: self.entries_verified.load(Ordering::Relaxed),
            hashes_computed: self.hashes_computed.load(Ordering::Relaxed),
        }
    }

    fn record_entry(&self, num_hashes: u64) {
        self.entries_verified.fetch_add(1, Ordering::Relaxed);
        self.hashes_computed.fetch_add(num_hashes, Ordering::Relaxed);
    }
}

/// Verifies a PoH chain against previously resumed state. Holds only the last
/// validated hash and slot/tick bookkeeping — entries are ephemeral.
#[derive(Debug)]
pub struct PohVerifier {
    current_hash: Hash,
    current_slot: Slot,
    ticks_per_slot: u64,
    stats: PohStats,
}

impl PohVerifier {
    pub fn new(ticks_per_slot: u64) -> Self {
        Self {
            current_hash: [0u8; 32],
            current_slot: 0,
            ticks_per_slot,
            stats: PohStats::default(),
        }
    }

    /// Initializes resume state, e.g. from a loaded snapshot's final hash.
    pub fn set_start(&mut self, hash: Hash, slot: Slot) {
        self.current_hash = hash;
        self.current_slot = slot;
    }

    pub fn current_hash(&self) -> Hash {
        self.current_hash
    }

    pub fn current_slot(&self) -> Slot {
        self.current_slot
    }

    pub fn stats(&self) -> PohStatsSnapshot {
        self.stats.snapshot()
    }

    /// Verifies one entry against `current_hash`, advancing it on success.
    pub fn verify_entry(&mut self, entry: &PohEntry) -> VerifyOutcome {
        let mut h = hash_chain(self.current_hash, entry.num_hashes);
        if let Some(mixin) = entry.mixin {
            h = fold_mixin(&h, &mixin);
        }
        self.stats.record_entry(entry.num_hashes);

        if h == entry.hash {
            self.current_hash = entry.hash;
            VerifyOutcome::valid()
        } else {
            VerifyOutcome {
                invalid_hash: true,
                ..Default::default()
            }
        }
    }

    /// Sequentially verifies every entry of `slot`. Rejects slots that don't
    /// extend `current_slot` by exactly one (or replay the current slot), and
    /// requires exactly `ticks_per_slot` mixin-less entries for a complete slot.
    pub fn verify_slot_entries(
        &mut self,
        entries: &[PohEntry],
        slot: Slot,
    ) -> Result<(), ChainViolation> {
        if slot != self.current_slot && slot != self.current_slot + 1 {
            return Err(ChainViolation::InvalidSequence {
                current: self.current_slot,
                got: slot,
            });
        }

        let mut ticks = 0u64;
        for entry in entries {
            let outcome = self.verify_entry(entry);
            if !outcome.valid {
                return Err(ChainViolation::InvalidHash { slot });
            }
            if entry.is_tick() {
                ticks += 1;
            }
        }

        if ticks != self.ticks_per_slot {
            return Err(ChainViolation::TickMismatch {
                slot,
                expected: self.ticks_per_slot,
                got: ticks,
            });
        }

        self.current_slot = slot;
        Ok(())
    }

    /// Splits `entries` into roughly equal segments and verifies each
    /// independently, starting from the claimed hash of the prior entry. Each
    /// entry self-declares its endpoint hash, so segments don't need to share
    /// mutable state to be checked concurrently. Equivalent to sequential
    /// verification (contract, spec §4.1).
    pub fn verify_parallel(&mut self, entries: &[PohEntry], num_segments: usize) -> VerifyOutcome {
        if entries.is_empty() {
            return VerifyOutcome::valid();
        }

        let num_segments = num_segments.clamp(1, entries.len());
        let chunk_size = entries.len().div_ceil(num_segments);

        let mut boundaries = Vec::new();
        let mut start_hash = self.current_hash;
        for chunk in entries.chunks(chunk_size) {
            boundaries.push(start_hash);
            start_hash = chunk.last().expect("chunk is non-empty").hash;
        }

        let all_valid = std::thread::scope(|scope| {
            let handles: Vec<_> = entries
                .chunks(chunk_size)
                .zip(boundaries)
                .map(|(chunk, seg_start)| scope.spawn(move || verify_segment(seg_start, chunk)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("verifier thread panicked"))
                .all(|ok| ok)
        });

        if all_valid {
            for entry in entries {
                self.stats.record_entry(entry.num_hashes);
            }
            self.current_hash = start_hash;
            VerifyOutcome::valid()
        } else {
            VerifyOutcome {
                invalid_hash: true,
                ..Default::default()
            }
        }
    }
}

fn verify_segment(start: Hash, entries: &[PohEntry]) -> bool {
    let mut current = start;
    for entry in entries {
        let mut h = hash_chain(current, entry.num_hashes);
        if let Some(mixin) = entry.mixin {
            h = fold_mixin(&h, &mixin);
        }
        if h != entry.hash {
            return false;
        }
        current = entry.hash;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(num_hashes: u64, hash: Hash) -> PohEntry {
        PohEntry {
            num_hashes,
            hash,
            mixin: None,
        }
    }

    #[test]
    fn scenario_single_entry_chain_verify() {
        let start = [0u8; 32];
        let h = hash_chain(start, 100);
        let mut verifier = PohVerifier::new(64);
        verifier.set_start(start, 0);

        let outcome = verifier.verify_entry(&tick(100, h));
        assert!(outcome.valid);
        assert_eq!(verifier.current_hash(), h);
    }

    #[test]
    fn rejects_hash_mismatch() {
        let mut verifier = PohVerifier::new(64);
        let outcome = verifier.verify_entry(&tick(10, [9u8; 32]));
        assert!(!outcome.valid);
        assert!(outcome.invalid_hash);
    }

    #[test]
    fn verify_slot_entries_requires_exact_tick_count() {
        let mut verifier = PohVerifier::new(2);
        let mut h = [0u8; 32];
        let mut entries = Vec::new();
        for _ in 0..3 {
            h = hash_chain(h, 1);
            entries.push(tick(1, h));
        }
        let err = verifier.verify_slot_entries(&entries, 0).unwrap_err();
        assert!(matches!(err, ChainViolation::TickMismatch { expected: 2, got: 3, .. }));
    }

    #[test]
    fn verify_slot_entries_rejects_out_of_sequence_slot() {
        let mut verifier = PohVerifier::new(1);
        verifier.set_start([0u8; 32], 5);
        let err = verifier.verify_slot_entries(&[], 10).unwrap_err();
        assert!(matches!(err, ChainViolation::InvalidSequence { current: 5, got: 10 }));
    }

    #[test]
    fn parallel_verification_matches_sequential() {
        let start = [0u8; 32];
        let mut hashes = Vec::new();
        let mut h = start;
        for _ in 0..40 {
            h = hash_chain(h, 3);
            hashes.push(h);
        }
        let entries: Vec<PohEntry> = hashes.into_iter().map(|h| tick(3, h)).collect();

        let mut sequential = PohVerifier::new(1000);
        for entry in &entries {
            assert!(sequential.verify_entry(entry).valid);
        }

        let mut parallel = PohVerifier::new(1000);
        let outcome = parallel.verify_parallel(&entries, 4);
        assert!(outcome.valid);
        assert_eq!(parallel.current_hash(), sequential.current_hash());
    }
}
