//! Property-based invariant tests for child lists and attach propagation.
//!
//! For any sequence of insert/remove/clear operations, accepted or rejected:
//!
//! 1. A node appears in at most one child list, and that list's owner is its
//!    parent.
//! 2. A node is attached exactly when it is reachable from the root.
//! 3. The tree's attached-node registry matches reachability.
//! 4. A rejected operation leaves every list unchanged.
//!
//! The same invariants hold when attach and detach listeners mutate the tree
//! while a change is being propagated.

mod common;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;
use statetree::{FeatureKind, NodeId, StateNode, StateTree, Tracker};

const POOL: usize = 7;

#[derive(Debug, Clone)]
enum Op {
    Add {
        parent: usize,
        child: usize,
        list: FeatureKind,
        position: usize,
    },
    Remove {
        parent: usize,
        list: FeatureKind,
        position: usize,
    },
    Clear {
        parent: usize,
        list: FeatureKind,
    },
}

fn list_strategy() -> impl Strategy<Value = FeatureKind> {
    prop_oneof![
        Just(FeatureKind::ElementChildren),
        Just(FeatureKind::VirtualChildren),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..POOL, 0..POOL, list_strategy(), 0usize..4).prop_map(
            |(parent, child, list, position)| Op::Add { parent, child, list, position }
        ),
        2 => (0..POOL, list_strategy(), 0usize..4)
            .prop_map(|(parent, list, position)| Op::Remove { parent, list, position }),
        1 => (0..POOL, list_strategy()).prop_map(|(parent, list)| Op::Clear { parent, list }),
    ]
}

/// What a node's lifecycle listener does to the tree.
#[derive(Debug, Clone)]
enum Reaction {
    Nothing,
    /// On attach, remove the node from its parent.
    LeaveParent,
    /// On attach, clear one of the node's own child lists.
    ClearOwn(FeatureKind),
    /// On attach, append another pool node to one of its lists.
    Adopt(usize, FeatureKind),
    /// On detach, move the node under the root's virtual children.
    Rescue,
}

/// Listener-driven mutations per case. Keeps listeners that re-trigger each
/// other from looping.
const REACTION_BUDGET: u32 = 6;

fn reaction_strategy() -> impl Strategy<Value = Reaction> {
    prop_oneof![
        3 => Just(Reaction::Nothing),
        1 => Just(Reaction::LeaveParent),
        1 => list_strategy().prop_map(Reaction::ClearOwn),
        1 => (0..POOL, list_strategy()).prop_map(|(other, list)| Reaction::Adopt(other, list)),
        1 => Just(Reaction::Rescue),
    ]
}

fn leave_parent(node: &StateNode) {
    if let Some(parent) = node.parent() {
        for kind in [FeatureKind::ElementChildren, FeatureKind::VirtualChildren] {
            if parent.children(kind).unwrap().remove_child(node).unwrap() {
                return;
            }
        }
    }
}

/// Installs one reaction per non-root node. Listeners reach the pool through
/// `shared`, which the caller empties afterwards to drop the handles.
fn install(
    pool: &[StateNode],
    reactions: &[Reaction],
    shared: &Rc<RefCell<Vec<StateNode>>>,
    budget: &common::Counter,
) {
    for (index, reaction) in reactions.iter().enumerate() {
        let index = index + 1;
        let (shared, budget, reaction) = (Rc::clone(shared), budget.clone(), reaction.clone());
        let spend = move || {
            if budget.get() >= REACTION_BUDGET {
                return false;
            }
            budget.bump();
            true
        };
        match reaction {
            Reaction::Nothing => {}
            Reaction::Rescue => {
                pool[index].add_detach_listener(move |node| {
                    if node.parent().is_none() && spend() {
                        let root = shared.borrow()[0].clone();
                        let _ = root.virtual_children().unwrap().append(node);
                    }
                });
            }
            attach => {
                pool[index].add_attach_listener(move |node| {
                    if !spend() {
                        return;
                    }
                    match &attach {
                        Reaction::LeaveParent => leave_parent(node),
                        Reaction::ClearOwn(kind) => node.children(*kind).unwrap().clear().unwrap(),
                        Reaction::Adopt(other, kind) => {
                            let other = shared.borrow()[*other].clone();
                            let _ = node.children(*kind).unwrap().append(&other);
                        }
                        Reaction::Nothing | Reaction::Rescue => {}
                    }
                });
            }
        }
    }
}

fn layout(pool: &[StateNode]) -> Vec<Vec<NodeId>> {
    let cx = Tracker::untracked();
    pool.iter()
        .flat_map(|node| {
            [FeatureKind::ElementChildren, FeatureKind::VirtualChildren]
                .into_iter()
                .map(|kind| {
                    let list = node.children(kind).unwrap();
                    common::ids(&list.child_nodes(&cx))
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn apply(pool: &[StateNode], op: &Op) -> bool {
    match *op {
        Op::Add {
            parent,
            child,
            list,
            position,
        } => pool[parent]
            .children(list)
            .unwrap()
            .add(position, &pool[child])
            .is_ok(),
        Op::Remove {
            parent,
            list,
            position,
        } => pool[parent].children(list).unwrap().remove(position).is_ok(),
        Op::Clear { parent, list } => pool[parent].children(list).unwrap().clear().is_ok(),
    }
}

fn check_invariants(tree: &StateTree, pool: &[StateNode]) -> Result<(), TestCaseError> {
    let cx = Tracker::untracked();
    let mut holders: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for owner in pool {
        owner.for_each_child(&cx, |child| {
            holders.entry(child.id()).or_default().push(owner.id());
        });
    }

    for node in pool {
        let held_by = holders.get(&node.id()).cloned().unwrap_or_default();
        prop_assert!(held_by.len() <= 1, "node {} held by {:?}", node.id(), held_by);
        prop_assert_eq!(held_by.first().copied(), node.parent().map(|p| p.id()));
    }

    let mut reachable = Vec::new();
    tree.visit_attached(|n| reachable.push(n.id()));
    for node in pool {
        prop_assert_eq!(
            node.is_attached(),
            reachable.contains(&node.id()),
            "attach state of {}",
            node.id()
        );
        if node.is_attached() && !node.is_root() {
            let parent_attached = node.parent().is_some_and(|p| p.is_attached());
            prop_assert!(parent_attached, "attached {} under detached parent", node.id());
        }
    }
    prop_assert_eq!(tree.attached_count(), reachable.len());
    Ok(())
}

proptest! {
    #[test]
    fn structure_stays_consistent(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let tree = StateTree::new();
        let mut pool = vec![tree.root().clone()];
        pool.extend((1..POOL).map(|_| common::element(&tree)));

        for op in &ops {
            let before = layout(&pool);
            let accepted = apply(&pool, op);
            if !accepted {
                prop_assert_eq!(layout(&pool), before, "rejected {:?} changed lists", op);
            }
            check_invariants(&tree, &pool)?;
        }
    }

    #[test]
    fn structure_survives_reentrant_listeners(
        reactions in proptest::collection::vec(reaction_strategy(), POOL - 1),
        ops in proptest::collection::vec(op_strategy(), 1..30),
    ) {
        let tree = StateTree::new();
        let mut pool = vec![tree.root().clone()];
        pool.extend((1..POOL).map(|_| common::element(&tree)));
        let shared = Rc::new(RefCell::new(pool.clone()));
        let budget = common::Counter::new();
        install(&pool, &reactions, &shared, &budget);

        let mut outcome = Ok(());
        for op in &ops {
            apply(&pool, op);
            outcome = check_invariants(&tree, &pool);
            if outcome.is_err() {
                break;
            }
        }
        shared.borrow_mut().clear();
        outcome?;
    }
}
