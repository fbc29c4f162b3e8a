//! Heaviest-subtree fork choice over an arena-indexed fork tree.

pub mod selector;
pub mod tree;

pub use selector::{ForkChoiceError, ForkChoiceSelector};
pub use tree::{ForkNode, ForkTree};
