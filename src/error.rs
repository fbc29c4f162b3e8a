//! Error taxonomy for the validator core.
//!
//! Each subsystem defines its own narrow error enum; [`Error`] wraps them so
//! callers at the process boundary (CLI, tests) can match on one type while
//! background threads keep logging and marking work items failed instead of
//! unwinding across a subsystem boundary (see spec §7).

use crate::accounts::append_vec::AppendVecError;
use crate::poh::verifier::ChainViolation;
use crate::snapshot::downloader::TransportError;
use crate::snapshot::filename::FilenameError;
use crate::tower::persistence::TowerError;
use crate::tower::tower_bft::LockedOut;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Chain(#[from] ChainViolation),

    #[error("vote locked out: slot {slot} conflicts with an active lockout")]
    VoteSafety { slot: u64 },

    #[error(transparent)]
    Persistence(#[from] TowerError),

    #[error("format error: {0}")]
    Format(String),

    #[error("corruption in {file}: {reason}")]
    Corruption { file: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<LockedOut> for Error {
    fn from(e: LockedOut) -> Self {
        Error::VoteSafety { slot: e.slot }
    }
}

impl From<FilenameError> for Error {
    fn from(e: FilenameError) -> Self {
        Error::Format(e.to_string())
    }
}

impl From<AppendVecError> for Error {
    fn from(e: AppendVecError) -> Self {
        Error::Corruption {
            file: String::new(),
            reason: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
