use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use statetree_reactive::{Computation, FlushStats, Reactive, Tracker};
use tracing::debug;

use crate::change::NodeChange;
use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::feature::FeatureSet;
use crate::node::{NodeId, StateNode};

pub(crate) struct TreeInner {
    pub(crate) config: TreeConfig,
    pub(crate) reactive: Reactive,
    pub(crate) root: StateNode,
    attached: RefCell<IndexMap<NodeId, StateNode>>,
    next_id: Cell<u32>,
    pub(crate) changes: RefCell<Vec<NodeChange>>,
}

impl TreeInner {
    pub(crate) fn register(&self, node: &StateNode) {
        self.attached.borrow_mut().insert(node.id(), node.clone());
    }

    pub(crate) fn unregister(&self, id: NodeId) {
        self.attached.borrow_mut().shift_remove(&id);
    }
}

/// A tree of [`StateNode`]s with one root, one id space and one reactive
/// scheduler.
///
/// Cloning yields another handle to the same tree.
#[derive(Clone)]
pub struct StateTree {
    inner: Rc<TreeInner>,
}

impl PartialEq for StateTree {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTree")
            .field("attached", &self.inner.attached.borrow().len())
            .field("pending_changes", &self.inner.changes.borrow().len())
            .finish()
    }
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTree {
    pub const ROOT_ID: NodeId = NodeId(1);

    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Creates a tree whose root declares every feature and is attached from
    /// the start.
    pub fn with_config(config: TreeConfig) -> Self {
        let reactive = Reactive::with_config(config.reactive.clone());
        let inner = Rc::new_cyclic(|tree| TreeInner {
            config,
            reactive,
            root: StateNode::new(tree.clone(), Self::ROOT_ID, FeatureSet::all()),
            attached: RefCell::new(IndexMap::new()),
            next_id: Cell::new(Self::ROOT_ID.0 + 1),
            changes: RefCell::new(Vec::new()),
        });
        inner.root.mark_root_attached();
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Rc<TreeInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.inner.config
    }

    pub fn reactive(&self) -> &Reactive {
        &self.inner.reactive
    }

    pub fn root(&self) -> &StateNode {
        &self.inner.root
    }

    /// Creates a detached node with a fresh id.
    pub fn create_node(&self, features: FeatureSet) -> StateNode {
        let id = NodeId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        StateNode::new(Rc::downgrade(&self.inner), id, features)
    }

    /// Looks up an attached node.
    pub fn node(&self, id: NodeId) -> Option<StateNode> {
        self.inner.attached.borrow().get(&id).cloned()
    }

    pub fn attached_count(&self) -> usize {
        self.inner.attached.borrow().len()
    }

    /// Walks the attached tree pre-order, starting at the root.
    pub fn visit_attached(&self, mut visitor: impl FnMut(&StateNode)) {
        let mut stack = vec![self.inner.root.clone()];
        while let Some(node) = stack.pop() {
            visitor(&node);
            let children = node.child_nodes();
            stack.extend(children.into_iter().rev());
        }
    }

    /// Drains the change log.
    pub fn collect_changes(&self) -> Vec<NodeChange> {
        let changes = std::mem::take(&mut *self.inner.changes.borrow_mut());
        if !changes.is_empty() {
            debug!(count = changes.len(), "collected node changes");
        }
        changes
    }

    pub fn has_changes(&self) -> bool {
        !self.inner.changes.borrow().is_empty()
    }

    /// Shorthand for `self.reactive().run_when_dependencies_change(body)`.
    pub fn run_when_dependencies_change(
        &self,
        body: impl FnMut(&Tracker) + 'static,
    ) -> Computation {
        self.inner.reactive.run_when_dependencies_change(body)
    }

    pub fn flush(&self) -> Result<FlushStats, TreeError> {
        Ok(self.inner.reactive.flush()?)
    }
}
