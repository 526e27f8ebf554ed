//! Tree nodes and attach/detach propagation.
//!
//! A node is attached while it is reachable from the root through child
//! lists. Attaching walks the subtree pre-order, detaching post-order. The
//! lifecycle events of a walk fire once the walk and its change records are
//! complete, so listeners always see a settled tree.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use statetree_reactive::{EventRouter, Registration, Tracker};
use tracing::trace;

use crate::change::NodeChange;
use crate::config::ValueChangePolicy;
use crate::error::TreeError;
use crate::feature::{
    Feature, FeatureKind, FeatureOwner, FeatureSet, FeatureShape, NodeList, NodeMap,
    NodeReferenceList,
};
use crate::tree::{StateTree, TreeInner};

/// Tree-unique node identifier. Ids are handed out by the tree and never
/// reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycleEvent {
    Attached(NodeId),
    Detached(NodeId),
}

pub(crate) struct NodeInner {
    id: NodeId,
    tree: Weak<TreeInner>,
    declared: FeatureSet,
    features: [OnceCell<Feature>; FeatureKind::COUNT],
    parent: RefCell<Weak<NodeInner>>,
    attached: Cell<bool>,
    /// Attach state last reported through `lifecycle`.
    announced: Cell<bool>,
    lifecycle: EventRouter<NodeLifecycleEvent>,
}

/// Handle to a node. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct StateNode {
    inner: Rc<NodeInner>,
}

impl PartialEq for StateNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for StateNode {}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.inner.id)
            .field("attached", &self.inner.attached.get())
            .field("features", &self.inner.declared)
            .finish()
    }
}

impl StateNode {
    pub(crate) fn new(tree: Weak<TreeInner>, id: NodeId, declared: FeatureSet) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                id,
                tree,
                declared,
                features: std::array::from_fn(|_| OnceCell::new()),
                parent: RefCell::new(Weak::new()),
                attached: Cell::new(false),
                announced: Cell::new(false),
                lifecycle: EventRouter::new(),
            }),
        }
    }

    pub(crate) fn upgrade(inner: &Weak<NodeInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The owning tree, unless it has been dropped.
    pub fn tree(&self) -> Option<StateTree> {
        self.inner.tree.upgrade().map(StateTree::from_inner)
    }

    pub(crate) fn tree_weak(&self) -> &Weak<TreeInner> {
        &self.inner.tree
    }

    pub fn same_tree_as(&self, other: &StateNode) -> bool {
        Weak::ptr_eq(&self.inner.tree, &other.inner.tree)
    }

    pub fn features(&self) -> FeatureSet {
        self.inner.declared
    }

    pub fn has_feature(&self, kind: FeatureKind) -> bool {
        self.inner.declared.has(kind)
    }

    pub fn parent(&self) -> Option<StateNode> {
        Self::upgrade(&self.inner.parent.borrow())
    }

    pub fn is_root(&self) -> bool {
        self.inner
            .tree
            .upgrade()
            .is_some_and(|tree| tree.root == *self)
    }

    /// True if `ancestor` is reachable by following parent links.
    pub fn is_descendant_of(&self, ancestor: &StateNode) -> bool {
        let mut current = self.parent();
        while let Some(node) = current {
            if node == *ancestor {
                return true;
            }
            current = node.parent();
        }
        false
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    /// Reactive variant of [`is_attached`](Self::is_attached): the tracker's
    /// computation is invalidated on the next attach or detach of this node.
    pub fn attached(&self, cx: &Tracker) -> bool {
        self.inner.lifecycle.register_read(cx);
        self.is_attached()
    }

    // ── Features ──────────────────────────────────────────────────────────

    /// Returns the feature, creating it on first access.
    pub fn feature(&self, kind: FeatureKind) -> Result<Feature, TreeError> {
        if !self.has_feature(kind) {
            return Err(TreeError::FeatureNotDeclared {
                node: self.id(),
                feature: kind,
            });
        }
        let feature = self.inner.features[kind.index()].get_or_init(|| {
            Feature::new(FeatureOwner {
                node: self.inner.id,
                kind,
                inner: Rc::downgrade(&self.inner),
                tree: self.inner.tree.clone(),
            })
        });
        Ok(feature.clone())
    }

    /// Returns the feature only if something already created it.
    pub fn existing_feature(&self, kind: FeatureKind) -> Option<Feature> {
        self.inner.features[kind.index()].get().cloned()
    }

    pub fn map(&self, kind: FeatureKind) -> Result<NodeMap, TreeError> {
        match self.feature(kind)? {
            Feature::Map(map) => Ok(map),
            _ => Err(self.shape_mismatch(kind, FeatureShape::Map)),
        }
    }

    pub fn list(&self, kind: FeatureKind) -> Result<NodeList, TreeError> {
        match self.feature(kind)? {
            Feature::List(list) => Ok(list),
            _ => Err(self.shape_mismatch(kind, FeatureShape::ValueList)),
        }
    }

    pub fn children(&self, kind: FeatureKind) -> Result<NodeReferenceList, TreeError> {
        match self.feature(kind)? {
            Feature::Children(children) => Ok(children),
            _ => Err(self.shape_mismatch(kind, FeatureShape::NodeList)),
        }
    }

    pub fn element_data(&self) -> Result<NodeMap, TreeError> {
        self.map(FeatureKind::ElementData)
    }

    pub fn element_properties(&self) -> Result<NodeMap, TreeError> {
        self.map(FeatureKind::ElementProperties)
    }

    pub fn element_attributes(&self) -> Result<NodeMap, TreeError> {
        self.map(FeatureKind::ElementAttributes)
    }

    pub fn element_children(&self) -> Result<NodeReferenceList, TreeError> {
        self.children(FeatureKind::ElementChildren)
    }

    pub fn virtual_children(&self) -> Result<NodeReferenceList, TreeError> {
        self.children(FeatureKind::VirtualChildren)
    }

    pub fn class_list(&self) -> Result<NodeList, TreeError> {
        self.list(FeatureKind::ClassList)
    }

    fn shape_mismatch(&self, kind: FeatureKind, expected: FeatureShape) -> TreeError {
        TreeError::FeatureShapeMismatch {
            node: self.id(),
            feature: kind,
            expected,
        }
    }

    /// Visits the nodes held by every child list of this node, in feature
    /// order. Registers a read on each instantiated child list.
    pub fn for_each_child(&self, cx: &Tracker, mut visitor: impl FnMut(&StateNode)) {
        for list in self.child_lists() {
            list.for_each_child(cx, &mut visitor);
        }
    }

    fn child_lists(&self) -> Vec<NodeReferenceList> {
        self.inner
            .features
            .iter()
            .filter_map(|slot| match slot.get() {
                Some(Feature::Children(list)) => Some(list.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn child_nodes(&self) -> Vec<StateNode> {
        self.child_lists()
            .iter()
            .flat_map(NodeReferenceList::snapshot_nodes)
            .collect()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    pub fn add_attach_listener(&self, listener: impl Fn(&StateNode) + 'static) -> Registration {
        let node = Rc::downgrade(&self.inner);
        self.inner.lifecycle.add_listener(move |event| {
            if let NodeLifecycleEvent::Attached(_) = event {
                if let Some(node) = StateNode::upgrade(&node) {
                    listener(&node);
                }
            }
        })
    }

    pub fn add_detach_listener(&self, listener: impl Fn(&StateNode) + 'static) -> Registration {
        let node = Rc::downgrade(&self.inner);
        self.inner.lifecycle.add_listener(move |event| {
            if let NodeLifecycleEvent::Detached(_) = event {
                if let Some(node) = StateNode::upgrade(&node) {
                    listener(&node);
                }
            }
        })
    }

    /// Checks that `child` may be placed in one of this node's child lists.
    pub(crate) fn check_can_adopt(&self, child: &StateNode) -> Result<(), TreeError> {
        if !self.same_tree_as(child) {
            return Err(TreeError::ForeignNode { node: child.id() });
        }
        if child.is_root() {
            return Err(TreeError::RootNotInsertable { node: child.id() });
        }
        if let Some(parent) = child.parent() {
            return Err(TreeError::AlreadyHasParent {
                node: child.id(),
                parent: parent.id(),
            });
        }
        if *child == *self || self.is_descendant_of(child) {
            return Err(TreeError::WouldCreateCycle {
                node: child.id(),
                parent: self.id(),
            });
        }
        Ok(())
    }

    pub(crate) fn set_parent(&self, parent: Option<&StateNode>) {
        *self.inner.parent.borrow_mut() = parent.map_or_else(Weak::new, |p| Rc::downgrade(&p.inner));
    }

    pub(crate) fn mark_root_attached(&self) {
        self.inner.attached.set(true);
        self.inner.announced.set(true);
        if let Some(tree) = self.inner.tree.upgrade() {
            tree.register(self);
        }
    }

    /// Marks the subtree attached and records it. Nodes that changed state
    /// are pushed to `changed` in walk order for [`announce`](Self::announce).
    pub(crate) fn attach_subtree(&self, changed: &mut Vec<StateNode>) {
        if self.inner.attached.replace(true) {
            return;
        }
        if let Some(tree) = self.inner.tree.upgrade() {
            tree.register(self);
        }
        trace!(node = %self.inner.id, "node attached");
        self.record(|| NodeChange::Attach { node: self.id() });
        self.record_contents(false);
        changed.push(self.clone());

        for child in self.child_nodes() {
            child.attach_subtree(changed);
        }
        self.record_contents(true);
    }

    pub(crate) fn detach_subtree(&self, changed: &mut Vec<StateNode>) {
        if !self.inner.attached.get() {
            return;
        }
        for child in self.child_nodes() {
            child.detach_subtree(changed);
        }
        self.record(|| NodeChange::Detach { node: self.id() });
        self.inner.attached.set(false);
        if let Some(tree) = self.inner.tree.upgrade() {
            tree.unregister(self.id());
        }
        trace!(node = %self.inner.id, "node detached");
        changed.push(self.clone());
    }

    /// Fires the lifecycle event for each node whose attach state differs
    /// from what it last reported. A node flipped back by an earlier listener
    /// reports nothing, so every node alternates `Attached` and `Detached`
    /// and its last event matches [`is_attached`](Self::is_attached).
    pub(crate) fn announce(changed: Vec<StateNode>) {
        for node in changed {
            let attached = node.inner.attached.get();
            if node.inner.announced.replace(attached) == attached {
                continue;
            }
            let event = if attached {
                NodeLifecycleEvent::Attached(node.id())
            } else {
                NodeLifecycleEvent::Detached(node.id())
            };
            node.inner.lifecycle.fire(event);
        }
    }

    /// Records the current content of instantiated features, either the
    /// child lists or everything else.
    fn record_contents(&self, child_lists: bool) {
        for slot in &self.inner.features {
            let changes = match slot.get() {
                Some(Feature::Map(map)) if !child_lists => map.snapshot_changes(),
                Some(Feature::List(list)) if !child_lists => list.snapshot_changes(),
                Some(Feature::Children(list)) if child_lists => list.snapshot_changes(),
                _ => continue,
            };
            for change in changes {
                self.record(|| change);
            }
        }
    }

    /// Appends a change record if this node is attached and its tree tracks
    /// changes. `change` is only evaluated when the record is kept.
    pub(crate) fn record(&self, change: impl FnOnce() -> NodeChange) {
        if !self.inner.attached.get() {
            return;
        }
        if let Some(tree) = self.inner.tree.upgrade() {
            if tree.config.track_changes {
                tree.changes.borrow_mut().push(change());
            }
        }
    }

    pub(crate) fn value_change_policy(&self) -> ValueChangePolicy {
        self.inner
            .tree
            .upgrade()
            .map(|tree| tree.config.value_change_policy)
            .unwrap_or_default()
    }
}
