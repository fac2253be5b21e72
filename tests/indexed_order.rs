//! Positional access on indexed set views stays consistent with ordering
//! however the view was edited.

use delta_smc::{shared, IndexedSet, IndexedSetDiff, SmcError, Timestep, Variable};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Edit {
    Insert(u16),
    Remove(u16),
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0u16..500).prop_map(Edit::Insert),
        (0u16..500).prop_map(Edit::Remove),
    ]
}

fn apply(view: &mut IndexedSetDiff<u16>, edits: &[Edit]) {
    for edit in edits {
        match edit {
            Edit::Insert(x) => {
                view.insert(*x).unwrap();
            }
            Edit::Remove(x) => {
                view.remove(x).unwrap();
            }
        }
    }
}

proptest! {
    #[test]
    fn get_is_strictly_increasing(
        base in prop::collection::btree_set(0u16..500, 0..300),
        edits in prop::collection::vec(arb_edit(), 0..200),
    ) {
        let mut view = IndexedSetDiff::new(shared(base.into_iter().collect::<IndexedSet<u16>>()));
        apply(&mut view, &edits);

        let n = view.len();
        for i in 1..n {
            prop_assert!(view.get(i - 1).unwrap() < view.get(i).unwrap());
        }
        let out_of_bounds = matches!(view.get(n), Err(SmcError::IndexOutOfBounds { .. }));
        prop_assert!(out_of_bounds);
    }

    #[test]
    fn index_of_inverts_get(
        base in prop::collection::btree_set(0u16..500, 0..300),
        edits in prop::collection::vec(arb_edit(), 0..200),
    ) {
        let mut view = IndexedSetDiff::new(shared(base.into_iter().collect::<IndexedSet<u16>>()));
        apply(&mut view, &edits);

        for i in 0..view.len() {
            let x = view.get(i).unwrap();
            prop_assert_eq!(view.index_of(&x), Some(i));
        }
        for x in 0u16..500 {
            if !view.contains(&x) {
                prop_assert_eq!(view.index_of(&x), None);
            }
        }
    }

    #[test]
    fn block_sizes_account_for_every_change(
        base in prop::collection::btree_set(0u16..500, 0..300),
        edits in prop::collection::vec(arb_edit(), 0..200),
    ) {
        let mut view = IndexedSetDiff::new(shared(base.into_iter().collect::<IndexedSet<u16>>()));
        apply(&mut view, &edits);

        let added: usize = view.blocks().filter(|b| !b.is_removal).map(|b| b.size).sum();
        let removed: usize = view.blocks().filter(|b| b.is_removal).map(|b| b.size).sum();
        prop_assert_eq!(added, view.additions().len());
        prop_assert_eq!(removed, view.removals().len());
        for block in view.blocks() {
            prop_assert!(block.first <= block.last);
            prop_assert!(block.size > 0);
        }
    }
}

#[test]
fn test_world_order_puts_oldest_timestep_first() {
    let mut view = IndexedSetDiff::empty();
    for t in (0..5).rev() {
        view.insert(Variable::temporal("state", t)).unwrap();
    }
    view.insert(Variable::atemporal("bias")).unwrap();

    assert_eq!(view.get(0).unwrap(), Variable::temporal("state", 0));
    assert_eq!(view.last(), Some(Variable::atemporal("bias")));

    let before: Vec<Variable> = view
        .iter()
        .take_while(|v| v.is_before(Timestep(3)))
        .collect();
    assert_eq!(before.len(), 3);
}
