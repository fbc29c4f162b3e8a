//! The in-memory Tower BFT driver: wraps [`VoteState`] with an identity key,
//! constructs and signs vote messages, and enforces `can_vote` before
//! mutating state.

use crate::tower::vote_state::VoteState;
use crate::types::{Hash, Pubkey, Signature, Slot};

/// A cast vote: the wire message plus its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub slot: Slot,
    pub bank_hash: Hash,
    pub timestamp: i64,
    pub signature: Signature,
}

/// Serializes the 48-byte PoH vote-signing message: `slot(8LE) || bank_hash(32) || timestamp(8LE)`.
pub fn vote_message(slot: Slot, bank_hash: &Hash, timestamp: i64) -> [u8; 48] {
    let mut buf = [0u8; 48];
    buf[0..8].copy_from_slice(&slot.to_le_bytes());
    buf[8..40].copy_from_slice(bank_hash);
    buf[40..48].copy_from_slice(&timestamp.to_le_bytes());
    buf
}

/// Signs a 48-byte message given a 32-byte identity. External collaborator
/// (spec §6): the core never touches private key material directly.
pub trait IdentitySigner {
    fn sign(&self, message: &[u8]) -> Signature;
}

#[derive(Debug, thiserror::Error)]
#[error("vote locked out: slot {slot} conflicts with an active lockout")]
pub struct LockedOut {
    pub slot: Slot,
}

pub struct Tower {
    pub identity: Pubkey,
    pub vote_account: Pubkey,
    pub vote_state: VoteState,
    signer: Option<Box<dyn IdentitySigner + Send + Sync>>,
}

impl std::fmt::Debug for Tower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tower")
            .field("identity", &self.identity)
            .field("vote_account", &self.vote_account)
            .field("vote_state", &self.vote_state)
            .finish()
    }
}

impl Tower {
    pub fn new(identity: Pubkey, vote_account: Pubkey) -> Self {
        Self {
            identity,
            vote_account,
            vote_state: VoteState::new(),
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: Box<dyn IdentitySigner + Send + Sync>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Casts a vote for `slot` if lockouts permit, recording it into the vote
    /// stack and signing the resulting message. Fails with [`LockedOut`]
    /// without touching `vote_state` otherwise.
    pub fn vote(&mut self, slot: Slot, bank_hash: Hash, timestamp: i64) -> Result<Vote, LockedOut> {
        if !self.vote_state.can_vote(slot) {
            return Err(LockedOut { slot });
        }

        self.vote_state.record_vote(slot);

        let message = vote_message(slot, &bank_hash, timestamp);
        let signature = match &self.signer {
            Some(signer) => signer.sign(&message),
            None => [0u8; 64],
        };

        Ok(Vote {
            slot,
            bank_hash,
            timestamp,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSigner(Signature);
    impl IdentitySigner for FixedSigner {
        fn sign(&self, _message: &[u8]) -> Signature {
            self.0
        }
    }

    #[test]
    fn scenario_second_vote_on_same_slot_is_locked_out() {
        let mut tower = Tower::new([1u8; 32], [2u8; 32]);
        let first = tower.vote(100, [0u8; 32], 0).unwrap();
        assert_eq!(first.slot, 100);

        let err = tower.vote(100, [0u8; 32], 0).unwrap_err();
        assert_eq!(err.slot, 100);
    }

    #[test]
    fn vote_message_layout_is_48_bytes_little_endian() {
        let msg = vote_message(1, &[2u8; 32], 3);
        assert_eq!(msg.len(), 48);
        assert_eq!(&msg[0..8], &1u64.to_le_bytes());
        assert_eq!(&msg[8..40], &[2u8; 32]);
        assert_eq!(&msg[40..48], &3i64.to_le_bytes());
    }

    #[test]
    fn vote_is_signed_with_configured_signer() {
        let mut tower = Tower::new([1u8; 32], [2u8; 32]).with_signer(Box::new(FixedSigner([7u8; 64])));
        let vote = tower.vote(5, [0u8; 32], 0).unwrap();
        assert_eq!(vote.signature, [7u8; 64]);
    }
}
