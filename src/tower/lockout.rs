//! Exponential lockout arithmetic on a single vote.

use crate::types::Slot;

/// A commitment not to vote on a conflicting fork for `2^confirmation_count` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lockout {
    pub slot: Slot,
    pub confirmation_count: u32,
}

/// Lockouts never confirm past this many doublings (P2).
pub const MAX_CONFIRMATION_COUNT: u32 = 63;

impl Lockout {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            confirmation_count: 1,
        }
    }

    /// `min(2^confirmation_count, 2^63)`, saturating rather than overflowing.
    pub fn lockout_duration(&self) -> u64 {
        1u64.checked_shl(self.confirmation_count.min(MAX_CONFIRMATION_COUNT))
            .unwrap_or(u64::MAX)
    }

    /// `slot + duration`, saturating on overflow.
    pub fn expiration_slot(&self) -> Slot {
        self.slot.saturating_add(self.lockout_duration())
    }

    /// True iff `target >= expiration_slot`.
    pub fn is_expired(&self, target: Slot) -> bool {
        target >= self.expiration_slot()
    }

    /// Increments confirmation_count, saturating at [`MAX_CONFIRMATION_COUNT`].
    pub fn increase_confirmation(&mut self) {
        if self.confirmation_count < MAX_CONFIRMATION_COUNT {
            self.confirmation_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_matches_spec_example() {
        let lockout = Lockout {
            slot: 100,
            confirmation_count: 3,
        };
        assert_eq!(lockout.lockout_duration(), 8);
        assert!(!lockout.is_expired(107));
        assert!(lockout.is_expired(108));
    }

    #[test]
    fn duration_saturates_at_63_confirmations() {
        let lockout = Lockout {
            slot: 0,
            confirmation_count: 63,
        };
        assert_eq!(lockout.lockout_duration(), 1u64 << 63);

        let over = Lockout {
            slot: 0,
            confirmation_count: 200,
        };
        assert_eq!(over.lockout_duration(), 1u64 << 63);
    }

    #[test]
    fn expiration_saturates_on_overflow() {
        let lockout = Lockout {
            slot: u64::MAX - 1,
            confirmation_count: 5,
        };
        assert_eq!(lockout.expiration_slot(), u64::MAX);
    }

    proptest::proptest! {
        #[test]
        fn expiration_matches_formula(slot in 0u64..1_000_000, c in 1u32..=63) {
            let lockout = Lockout { slot, confirmation_count: c };
            let expected = slot.saturating_add(1u64.checked_shl(c).unwrap_or(u64::MAX));
            proptest::prop_assert_eq!(lockout.expiration_slot(), expected);
        }
    }
}
