//! Deterministic, stake-proportional per-epoch leader assignment.

pub mod cache;
pub mod generator;

pub use cache::LeaderScheduleCache;
pub use generator::{generate, EpochSchedule, LeaderScheduleError};
