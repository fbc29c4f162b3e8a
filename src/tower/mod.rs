//! Tower BFT: exponential lockouts, vote stack, root advancement, and
//! crash-safe persistence across restarts.

pub mod lockout;
pub mod persistence;
pub mod tower_bft;
pub mod vote_state;

pub use lockout::Lockout;
pub use persistence::SavedTower;
pub use tower_bft::{Tower, Vote};
pub use vote_state::VoteState;
