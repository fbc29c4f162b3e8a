//! Heaviest-subtree best-slot selection, confirmation, and root advancement.

use std::collections::HashMap;

use crate::fork_choice::tree::{ForkTree, UnknownParent};
use crate::types::{Hash, Pubkey, Slot};

/// Slots beyond this many ancestors behind a confirmed slot are eligible to
/// become the new root (spec §4.3).
pub const ROOT_ADVANCE_DEPTH: u64 = 32;

#[derive(Debug, thiserror::Error)]
pub enum ForkChoiceError {
    #[error(transparent)]
    UnknownParent(#[from] UnknownParent),
    #[error("slot {slot} is unknown and no parent was supplied to create it")]
    MissingParent { slot: Slot },
}

/// Wraps a [`ForkTree`] with the stake registry and best-slot bookkeeping
/// needed to turn votes into a fork choice.
#[derive(Debug)]
pub struct ForkChoiceSelector {
    pub tree: ForkTree,
    stakes: HashMap<Pubkey, u64>,
    total_stake: u64,
}

impl ForkChoiceSelector {
    pub fn new(root_slot: Slot, root_bank_hash: Hash) -> Self {
        Self {
            tree: ForkTree::new(root_slot, root_bank_hash),
            stakes: HashMap::new(),
            total_stake: 0,
        }
    }

    pub fn register_voter(&mut self, voter: Pubkey, stake: u64) {
        let previous = self.stakes.insert(voter, stake).unwrap_or(0);
        self.total_stake = self.total_stake.saturating_sub(previous).saturating_add(stake);
    }

    /// Registered stake, or 1 for an unregistered voter (spec §4.3 step 1).
    fn stake_of(&self, voter: &Pubkey) -> u64 {
        self.stakes.get(voter).copied().unwrap_or(1)
    }

    pub fn total_stake(&self) -> u64 {
        self.total_stake
    }

    /// `floor(total_stake * 2 / 3) + 1`.
    pub fn supermajority_threshold(&self) -> u64 {
        (self.total_stake * 2 / 3) + 1
    }

    pub fn add_fork(&mut self, slot: Slot, parent: Slot, bank_hash: Hash) -> Result<(), ForkChoiceError> {
        self.tree.add_fork(slot, parent, bank_hash)?;
        Ok(())
    }

    /// Records a vote for `slot` by `voter`. If `slot` is not yet tracked,
    /// `parent` must name its real parent — this implementation refuses the
    /// source's `parent = slot - 1` fallback as unsafe (spec Design Notes).
    pub fn on_vote(
        &mut self,
        slot: Slot,
        voter: Pubkey,
        bank_hash: Hash,
        parent: Option<Slot>,
    ) -> Result<(), ForkChoiceError> {
        if !self.tree.contains(slot) {
            match parent {
                Some(parent) => self.tree.add_fork(slot, parent, bank_hash)?,
                None => return Err(ForkChoiceError::MissingParent { slot }),
            }
        }

        let stake = self.stake_of(&voter);
        self.tree.propagate_stake(slot, stake);
        self.recompute_best_slot();
        self.check_confirmation(slot);
        Ok(())
    }

    /// Walks from the root, at each step choosing the child with maximum
    /// `cumulative_stake` (ties broken by the lower slot id for determinism),
    /// until a leaf.
    pub fn recompute_best_slot(&mut self) {
        let mut current = self.tree.root_slot();
        loop {
            let node = match self.tree.get(current) {
                Some(node) => node,
                None => break,
            };
            let best_child = node
                .children
                .iter()
                .copied()
                .filter_map(|child| self.tree.get(child).map(|n| (child, n.cumulative_stake)))
                .max_by(|(slot_a, stake_a), (slot_b, stake_b)| {
                    stake_a
                        .cmp(stake_b)
                        .then_with(|| slot_b.cmp(slot_a))
                });
            match best_child {
                Some((child, _)) => current = child,
                None => break,
            }
        }
        self.tree.best_slot = current;
    }

    /// Marks `slot` confirmed once its cumulative stake reaches supermajority,
    /// and attempts a root advance once it is also sufficiently deep.
    pub fn check_confirmation(&mut self, slot: Slot) {
        let threshold = self.supermajority_threshold();
        let root = self.tree.root_slot();

        let (cumulative, became_confirmed) = match self.tree.node_mut(slot) {
            Some(node) => {
                let confirmed = node.cumulative_stake >= threshold;
                if confirmed {
                    node.is_confirmed = true;
                }
                (node.cumulative_stake, confirmed)
            }
            None => return,
        };

        if became_confirmed && cumulative >= threshold && slot > root + ROOT_ADVANCE_DEPTH {
            let ancestors = self.tree.ancestors(slot);
            let all_confirmed_ancestors = ancestors
                .iter()
                .all(|a| self.tree.get(*a).map(|n| n.is_confirmed).unwrap_or(false));
            if all_confirmed_ancestors {
                self.maybe_advance_root(slot);
            }
        }
    }

    /// Walks ancestors of `confirmed_slot` toward the root; the highest
    /// ancestor that is both confirmed and more than [`ROOT_ADVANCE_DEPTH`]
    /// slots behind `confirmed_slot` becomes the new root. Prunes everything
    /// below it afterward.
    pub fn maybe_advance_root(&mut self, confirmed_slot: Slot) {
        let mut candidate = None;
        for ancestor in self.tree.ancestors(confirmed_slot) {
            let eligible = ancestor + ROOT_ADVANCE_DEPTH < confirmed_slot
                && self.tree.get(ancestor).map(|n| n.is_confirmed).unwrap_or(false);
            if eligible {
                candidate = Some(ancestor);
                break;
            }
        }

        if let Some(new_root) = candidate {
            self.tree.prune(new_root);
        }
    }
}
