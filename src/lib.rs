//! # Vexor
//!
//! Core subsystems of a Solana-compatible validator client: Proof-of-History
//! verification and recording, Tower BFT voting, heaviest-subtree fork
//! choice, deterministic leader scheduling, AppendVec account parsing, and
//! snapshot bootstrap.
//!
//! ## Example
//!
//! ```
//! use vexor::poh::{PohEntry, PohVerifier};
//!
//! let mut verifier = PohVerifier::new(64);
//! let outcome = verifier.verify_entry(&PohEntry { num_hashes: 1, hash: [0u8; 32], mixin: None });
//! assert!(!outcome.valid);
//! ```

pub mod accounts;
pub mod clock;
pub mod config;
pub mod error;
pub mod fork_choice;
pub mod leader_schedule;
pub mod poh;
pub mod snapshot;
pub mod tower;
pub mod types;

pub use error::{Error, Result};
