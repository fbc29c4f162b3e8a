//! PoH entries and the single-step SHA-256 hash chain they are built from.

use crate::types::Hash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single entry in the Proof-of-History chain.
///
/// An entry with `mixin == None` and `num_hashes >= 1` is a tick: it marks the
/// passage of time without a transaction batch. An entry with `mixin ==
/// Some(_)` folds a transaction-batch hash into the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PohEntry {
    pub num_hashes: u64,
    pub hash: Hash,
    pub mixin: Option<Hash>,
}

impl PohEntry {
    pub fn is_tick(&self) -> bool {
        self.mixin.is_none() && self.num_hashes >= 1
    }
}

/// Advances `start` by `n` sequential SHA-256 steps.
///
/// `hash_chain(h, 0) == h`; `hash_chain(h, n) == hash_chain(hash_chain(h, n - 1), 1)`
/// for all `n >= 1` (property P1).
pub fn hash_chain(start: Hash, n: u64) -> Hash {
    let mut current = start;
    for _ in 0..n {
        current = sha256_once(&current);
    }
    current
}

/// One SHA-256 application over a 32-byte input.
pub fn sha256_once(input: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256 over `state || mixin`, used to fold a transaction-batch hash into the chain.
pub fn fold_mixin(state: &Hash, mixin: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(state);
    hasher.update(mixin);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
