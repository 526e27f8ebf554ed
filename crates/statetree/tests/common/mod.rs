#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use statetree::{FeatureSet, NodeId, StateNode, StateTree};

/// Shared counter that closures can bump.
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<u32>>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

/// Ordered log of lifecycle transitions, `"+3"` for attach and `"-3"` for
/// detach of node 3.
#[derive(Clone, Default)]
pub struct LifecycleLog(Rc<RefCell<Vec<String>>>);

impl LifecycleLog {
    pub fn watch(&self, node: &StateNode) {
        let log = self.0.clone();
        node.add_attach_listener(move |n| log.borrow_mut().push(format!("+{}", n.id())));
        let log = self.0.clone();
        node.add_detach_listener(move |n| log.borrow_mut().push(format!("-{}", n.id())));
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

pub fn element(tree: &StateTree) -> StateNode {
    tree.create_node(FeatureSet::all())
}

/// root -> a -> (b, c), built detached.
pub fn small_subtree(tree: &StateTree) -> (StateNode, StateNode, StateNode) {
    let a = element(tree);
    let b = element(tree);
    let c = element(tree);
    a.element_children().unwrap().add_all([&b, &c]).unwrap();
    (a, b, c)
}

pub fn ids(nodes: &[StateNode]) -> Vec<NodeId> {
    nodes.iter().map(StateNode::id).collect()
}
