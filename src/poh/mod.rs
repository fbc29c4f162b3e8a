//! Proof-of-History: a verifiable SHA-256 chain used as a pre-consensus clock.

pub mod entry;
pub mod recorder;
pub mod verifier;

pub use entry::{hash_chain, PohEntry};
pub use recorder::PohRecorder;
pub use verifier::{PohVerifier, VerifyOutcome};
