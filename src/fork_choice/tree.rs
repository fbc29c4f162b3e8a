//! Arena-indexed fork tree.
//!
//! The source represents fork nodes as a hash map of owned nodes, each
//! mutating its parent's children on insert — a cyclic-looking structure in a
//! language with raw pointers. Here nodes are plain values keyed by [`Slot`]
//! in a `HashMap`; children are slots in a `BTreeSet` (sorted, for
//! deterministic tie-breaking) and parent links are `Option<Slot>`.
//! Traversal goes through the map rather than through pointers, so there is
//! no cyclic ownership to reason about.

use std::collections::{BTreeSet, HashMap};

use crate::types::{Hash, Slot};

#[derive(Debug, Clone)]
pub struct ForkNode {
    pub slot: Slot,
    pub parent: Option<Slot>,
    pub bank_hash: Hash,
    pub direct_stake: u64,
    pub cumulative_stake: u64,
    pub children: BTreeSet<Slot>,
    pub is_confirmed: bool,
    pub is_finalized: bool,
}

impl ForkNode {
    fn new(slot: Slot, parent: Option<Slot>, bank_hash: Hash) -> Self {
        Self {
            slot,
            parent,
            bank_hash,
            direct_stake: 0,
            cumulative_stake: 0,
            children: BTreeSet::new(),
            is_confirmed: false,
            is_finalized: false,
        }
    }
}

/// A forest rooted at `root_slot`, with every node reachable from the root
/// by ancestor edges.
#[derive(Debug)]
pub struct ForkTree {
    nodes: HashMap<Slot, ForkNode>,
    root_slot: Slot,
    pub(crate) best_slot: Slot,
    pub(crate) voter_stake_by_slot: HashMap<Slot, u64>,
}

impl ForkTree {
    pub fn new(root_slot: Slot, root_bank_hash: Hash) -> Self {
        let mut nodes = HashMap::new();
        let mut root = ForkNode::new(root_slot, None, root_bank_hash);
        root.is_finalized = true;
        root.is_confirmed = true;
        nodes.insert(root_slot, root);
        Self {
            nodes,
            root_slot,
            best_slot: root_slot,
            voter_stake_by_slot: HashMap::new(),
        }
    }

    pub fn root_slot(&self) -> Slot {
        self.root_slot
    }

    pub fn best_slot(&self) -> Slot {
        self.best_slot
    }

    pub fn get(&self, slot: Slot) -> Option<&ForkNode> {
        self.nodes.get(&slot)
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.nodes.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds `slot` as a child of `parent`, idempotently. `parent` must already
    /// be tracked (spec's Design Notes reject the source's `parent = slot - 1`
    /// fallback as unsafe — callers must supply the real parent).
    pub fn add_fork(
        &mut self,
        slot: Slot,
        parent: Slot,
        bank_hash: Hash,
    ) -> Result<(), UnknownParent> {
        if !self.nodes.contains_key(&parent) {
            return Err(UnknownParent { parent });
        }
        if self.nodes.contains_key(&slot) {
            return Ok(());
        }
        self.nodes
            .insert(slot, ForkNode::new(slot, Some(parent), bank_hash));
        self.nodes.get_mut(&parent).unwrap().children.insert(slot);
        Ok(())
    }

    /// Saturating-adds `stake` to `slot`'s `direct_stake` and to every
    /// ancestor's `cumulative_stake` up to and including the root.
    pub fn propagate_stake(&mut self, slot: Slot, stake: u64) {
        if let Some(node) = self.nodes.get_mut(&slot) {
            node.direct_stake = node.direct_stake.saturating_add(stake);
            let entry = self.voter_stake_by_slot.entry(slot).or_insert(0);
            *entry = entry.saturating_add(stake);
        }

        let mut cursor = Some(slot);
        while let Some(s) = cursor {
            let parent = match self.nodes.get_mut(&s) {
                Some(node) => {
                    node.cumulative_stake = node.cumulative_stake.saturating_add(stake);
                    node.parent
                }
                None => break,
            };
            cursor = parent;
        }
    }

    /// Removes every node with `slot < new_root`, releasing memory. The new
    /// root's `parent` is cleared since it is now the forest root.
    pub fn prune(&mut self, new_root: Slot) {
        self.nodes.retain(|slot, _| *slot >= new_root);
        if let Some(root) = self.nodes.get_mut(&new_root) {
            root.parent = None;
            root.is_finalized = true;
        }
        self.root_slot = new_root;
    }

    pub(crate) fn node_mut(&mut self, slot: Slot) -> Option<&mut ForkNode> {
        self.nodes.get_mut(&slot)
    }

    pub(crate) fn ancestors(&self, slot: Slot) -> Vec<Slot> {
        let mut out = Vec::new();
        let mut cursor = self.nodes.get(&slot).and_then(|n| n.parent);
        while let Some(s) = cursor {
            out.push(s);
            cursor = self.nodes.get(&s).and_then(|n| n.parent);
        }
        out
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown parent slot {parent}; fork choice requires an explicit parent, it will not guess slot - 1")]
pub struct UnknownParent {
    pub parent: Slot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_fork_is_idempotent() {
        let mut tree = ForkTree::new(0, [0u8; 32]);
        tree.add_fork(1, 0, [1u8; 32]).unwrap();
        tree.add_fork(1, 0, [1u8; 32]).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(0).unwrap().children.len(), 1);
    }

    #[test]
    fn add_fork_rejects_unknown_parent() {
        let mut tree = ForkTree::new(0, [0u8; 32]);
        assert!(tree.add_fork(5, 4, [0u8; 32]).is_err());
    }

    #[test]
    fn propagate_stake_reaches_the_root() {
        let mut tree = ForkTree::new(0, [0u8; 32]);
        tree.add_fork(1, 0, [0u8; 32]).unwrap();
        tree.add_fork(2, 1, [0u8; 32]).unwrap();
        tree.propagate_stake(2, 10);
        assert_eq!(tree.get(2).unwrap().direct_stake, 10);
        assert_eq!(tree.get(2).unwrap().cumulative_stake, 10);
        assert_eq!(tree.get(1).unwrap().cumulative_stake, 10);
        assert_eq!(tree.get(0).unwrap().cumulative_stake, 10);
        assert_eq!(tree.get(1).unwrap().direct_stake, 0);
    }

    #[test]
    fn prune_drops_nodes_below_new_root() {
        let mut tree = ForkTree::new(0, [0u8; 32]);
        tree.add_fork(1, 0, [0u8; 32]).unwrap();
        tree.add_fork(2, 1, [0u8; 32]).unwrap();
        tree.prune(1);
        assert!(!tree.contains(0));
        assert!(tree.contains(1));
        assert_eq!(tree.get(1).unwrap().parent, None);
        assert_eq!(tree.root_slot(), 1);
    }

    /// `cumulative_stake` of any node equals its own `direct_stake` plus the
    /// sum of its children's `cumulative_stake` (P6), checked over a small
    /// branching tree after an arbitrary sequence of votes.
    #[test]
    fn cumulative_stake_equals_direct_plus_children() {
        let mut tree = ForkTree::new(0, [0u8; 32]);
        tree.add_fork(1, 0, [0u8; 32]).unwrap();
        tree.add_fork(2, 1, [0u8; 32]).unwrap();
        tree.add_fork(3, 1, [0u8; 32]).unwrap();
        tree.add_fork(4, 0, [0u8; 32]).unwrap();

        tree.propagate_stake(2, 7);
        tree.propagate_stake(3, 11);
        tree.propagate_stake(4, 5);
        tree.propagate_stake(1, 2);

        for slot in [0, 1, 2, 3, 4] {
            let node = tree.get(slot).unwrap();
            let children_sum: u64 = node
                .children
                .iter()
                .map(|c| tree.get(*c).unwrap().cumulative_stake)
                .sum();
            assert_eq!(node.cumulative_stake, node.direct_stake + children_sum);
        }
    }
}
