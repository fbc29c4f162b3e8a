//! End-to-end fork choice: several validators vote across competing forks and
//! the heaviest subtree wins, then accumulates enough confirmed, sufficiently
//! deep ancestors to advance the root and prune the abandoned fork.

use vexor::fork_choice::ForkChoiceSelector;

#[test]
fn heaviest_subtree_wins_and_root_advances_past_the_losing_fork() {
    let mut selector = ForkChoiceSelector::new(0, [0u8; 32]);

    selector.register_voter([b'A'; 32], 40);
    selector.register_voter([b'B'; 32], 35);
    selector.register_voter([b'C'; 32], 25);

    // Build a long common trunk so a later confirmation can clear the
    // root-advance depth, then fork into a heavy branch and a light one.
    let mut parent = 0;
    for slot in 1..=35 {
        selector.add_fork(slot, parent, [slot as u8; 32]).unwrap();
        parent = slot;
    }
    selector.add_fork(36, 35, [b'h'; 32]).unwrap(); // heavy branch
    selector.add_fork(37, 35, [b'l'; 32]).unwrap(); // light branch

    for slot in 1..=35 {
        selector.on_vote(slot, [b'A'; 32], [slot as u8; 32], None).unwrap();
        selector.on_vote(slot, [b'B'; 32], [slot as u8; 32], None).unwrap();
        selector.on_vote(slot, [b'C'; 32], [slot as u8; 32], None).unwrap();
    }
    selector.on_vote(36, [b'A'; 32], [b'h'; 32], None).unwrap();
    selector.on_vote(36, [b'B'; 32], [b'h'; 32], None).unwrap();
    selector.on_vote(37, [b'C'; 32], [b'l'; 32], None).unwrap();

    assert_eq!(selector.tree.get(36).unwrap().cumulative_stake, 75);
    assert_eq!(selector.tree.get(37).unwrap().cumulative_stake, 25);
    assert_eq!(selector.tree.best_slot(), 36);

    // The trunk accumulated full stake at every slot, so the root should
    // have advanced well past slot 0. Root advance prunes by slot number,
    // not by fork membership, so the light branch at slot 37 (a sibling of
    // the new root's descendant, not below it) is untouched — only the
    // original slot-0 trunk below the new root is gone.
    assert!(selector.tree.root_slot() > 0);
    assert!(!selector.tree.contains(0));
    assert!(selector.tree.contains(36));
    assert!(selector.tree.contains(37));
    assert!(selector.tree.get(36).unwrap().is_confirmed);
    assert!(!selector.tree.get(37).unwrap().is_confirmed);
}

#[test]
fn voting_on_an_unseen_slot_without_a_parent_is_rejected() {
    let mut selector = ForkChoiceSelector::new(0, [0u8; 32]);
    selector.register_voter([1u8; 32], 10);

    let err = selector
        .on_vote(100, [1u8; 32], [0u8; 32], None)
        .unwrap_err();
    assert!(format!("{err}").contains("100"));
}
