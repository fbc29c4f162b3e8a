//! Shared primitive types used across every subsystem.

use serde::{Deserialize, Serialize};

/// A monotone slot counter. Slots name a unit of block production time.
pub type Slot = u64;

/// A fixed-length window of slots over which stake and leader schedule are constant.
pub type Epoch = u64;

/// 32-byte opaque value, typically a SHA-256 output.
pub type Hash = [u8; 32];

/// 32-byte validator/account identity.
pub type Pubkey = [u8; 32];

/// 64-byte Ed25519 signature.
pub type Signature = [u8; 64];

/// Default slots per epoch, matching Solana mainnet-beta.
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 432_000;

/// Default PoH ticks per slot.
pub const DEFAULT_TICKS_PER_SLOT: u64 = 64;

/// Formats a 32-byte hash as lowercase hex, used in log lines across subsystems.
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A stake-weighted validator entry, used by fork choice and leader schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    pub pubkey: Pubkey,
    pub stake: u64,
}
