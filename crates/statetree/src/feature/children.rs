use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use statetree_reactive::{EventRouter, Registration, Tracker};
use tracing::{debug, warn};

use super::{FeatureKind, FeatureOwner, ListSpliceEvent};
use crate::change::NodeChange;
use crate::error::TreeError;
use crate::node::{NodeId, StateNode};
use crate::reference::NodeReference;

struct ChildrenInner {
    owner: FeatureOwner,
    items: RefCell<Vec<NodeReference>>,
    router: EventRouter<ListSpliceEvent<NodeReference>>,
}

/// List of node references whose targets are children of the owning node.
///
/// Inserting a node makes the owner its parent and, if the owner is
/// attached, attaches the node's subtree. Removing or clearing detaches and
/// clears the payload of every removed reference.
#[derive(Clone)]
pub struct NodeReferenceList {
    inner: Rc<ChildrenInner>,
}

impl PartialEq for NodeReferenceList {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NodeReferenceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<NodeId> = self
            .snapshot_nodes()
            .iter()
            .map(StateNode::id)
            .collect();
        f.debug_struct("NodeReferenceList")
            .field("node", &self.inner.owner.node)
            .field("kind", &self.inner.owner.kind)
            .field("children", &ids)
            .finish()
    }
}

impl NodeReferenceList {
    pub(crate) fn new(owner: FeatureOwner) -> Self {
        Self {
            inner: Rc::new(ChildrenInner {
                owner,
                items: RefCell::new(Vec::new()),
                router: EventRouter::new(),
            }),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        self.inner.owner.kind
    }

    pub fn node_id(&self) -> NodeId {
        self.inner.owner.node
    }

    pub fn node(&self) -> Option<StateNode> {
        self.inner.owner.node()
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    pub fn size(&self, cx: &Tracker) -> usize {
        self.inner.router.register_read(cx);
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self, cx: &Tracker) -> bool {
        self.size(cx) == 0
    }

    pub fn get(&self, cx: &Tracker, index: usize) -> Result<NodeReference, TreeError> {
        self.inner.router.register_read(cx);
        let items = self.inner.items.borrow();
        items
            .get(index)
            .cloned()
            .ok_or_else(|| self.inner.owner.out_of_range(index, items.len()))
    }

    /// The node behind a direct reference.
    pub fn node_at(&self, cx: &Tracker, index: usize) -> Result<StateNode, TreeError> {
        let reference = self.get(cx, index)?;
        reference
            .get()
            .cloned()
            .ok_or_else(|| self.not_direct(index))
    }

    pub fn references(&self, cx: &Tracker) -> Vec<NodeReference> {
        self.inner.router.register_read(cx);
        self.inner.items.borrow().clone()
    }

    /// Position of the direct reference to `node`. Composite entries never
    /// match.
    pub fn index_of(&self, cx: &Tracker, node: &StateNode) -> Option<usize> {
        self.inner.router.register_read(cx);
        self.inner
            .items
            .borrow()
            .iter()
            .position(|reference| reference.get() == Some(node))
    }

    /// Visits every referenced node, expanding composite entries.
    pub fn for_each_child(&self, cx: &Tracker, mut visitor: impl FnMut(&StateNode)) {
        self.inner.router.register_read(cx);
        for node in self.snapshot_nodes() {
            visitor(&node);
        }
    }

    pub fn child_nodes(&self, cx: &Tracker) -> Vec<StateNode> {
        self.inner.router.register_read(cx);
        self.snapshot_nodes()
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    pub fn add(&self, index: usize, node: &StateNode) -> Result<(), TreeError> {
        self.insert_references(index, vec![NodeReference::direct(node)])
    }

    pub fn append(&self, node: &StateNode) -> Result<(), TreeError> {
        self.add(self.len(), node)
    }

    /// Inserts `node` with a payload describing how the client should bind
    /// it, e.g. `{"type": "inMemory", "payload": ...}` for virtual children.
    pub fn add_with_payload(
        &self,
        index: usize,
        node: &StateNode,
        payload: Value,
    ) -> Result<(), TreeError> {
        self.insert_references(index, vec![NodeReference::with_payload(node, Some(payload))])
    }

    pub fn append_with_payload(&self, node: &StateNode, payload: Value) -> Result<(), TreeError> {
        self.add_with_payload(self.len(), node, payload)
    }

    pub fn insert_reference(&self, index: usize, reference: NodeReference) -> Result<(), TreeError> {
        self.insert_references(index, vec![reference])
    }

    /// Appends every node, or none of them if any is rejected.
    pub fn add_all<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a StateNode>,
    ) -> Result<(), TreeError> {
        let references: Vec<NodeReference> = nodes.into_iter().map(NodeReference::direct).collect();
        if references.is_empty() {
            return Ok(());
        }
        self.insert_references(self.len(), references)
    }

    pub fn remove(&self, index: usize) -> Result<NodeReference, TreeError> {
        let size = self.len();
        if index >= size {
            return Err(self.inner.owner.out_of_range(index, size));
        }
        let mut removed = self.take_references(index, 1, false)?;
        removed
            .pop()
            .ok_or_else(|| self.inner.owner.out_of_range(index, size))
    }

    /// Removes a direct reference and returns its node.
    pub fn remove_node(&self, index: usize) -> Result<StateNode, TreeError> {
        let node = self.node_at(&Tracker::untracked(), index)?;
        self.remove(index)?;
        Ok(node)
    }

    /// Removes the direct reference to `node`, if present.
    pub fn remove_child(&self, node: &StateNode) -> Result<bool, TreeError> {
        match self.index_of(&Tracker::untracked(), node) {
            Some(index) => self.remove(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Empties the list, then detaches every former child.
    pub fn clear(&self) -> Result<(), TreeError> {
        let size = self.len();
        if size == 0 {
            return Ok(());
        }
        self.take_references(0, size, true).map(drop)
    }

    pub fn add_splice_listener(
        &self,
        listener: impl Fn(&ListSpliceEvent<NodeReference>) + 'static,
    ) -> Registration {
        self.inner.router.add_listener(listener)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    fn not_direct(&self, index: usize) -> TreeError {
        TreeError::NotDirectReference {
            node: self.inner.owner.node,
            feature: self.inner.owner.kind,
            index,
        }
    }

    fn insert_references(
        &self,
        index: usize,
        references: Vec<NodeReference>,
    ) -> Result<(), TreeError> {
        let size = self.len();
        if index > size {
            return Err(self.inner.owner.out_of_range(index, size));
        }
        let owner = self.inner.owner.require_node()?;

        let mut incoming: Vec<StateNode> = Vec::new();
        for reference in &references {
            reference.visit_or_children(&mut |node| incoming.push(node.clone()));
        }
        for (i, node) in incoming.iter().enumerate() {
            owner.check_can_adopt(node)?;
            if incoming[..i].contains(node) {
                return Err(TreeError::AlreadyHasParent {
                    node: node.id(),
                    parent: owner.id(),
                });
            }
        }

        {
            let mut items = self.inner.items.borrow_mut();
            let tail = items.split_off(index);
            items.extend(references.iter().cloned());
            items.extend(tail);
        }
        for node in &incoming {
            node.set_parent(Some(&owner));
        }
        let mut changed = Vec::new();
        if owner.is_attached() {
            for node in &incoming {
                node.attach_subtree(&mut changed);
            }
        }

        let kind = self.inner.owner.kind;
        owner.record(|| NodeChange::Splice {
            node: owner.id(),
            feature: kind,
            index,
            remove: 0,
            add: references.iter().map(NodeReference::to_change_value).collect(),
        });
        debug!(node = %owner.id(), feature = %kind, index, count = incoming.len(), "children added");
        self.inner.router.fire(ListSpliceEvent {
            index,
            removed: Vec::new(),
            added: references,
            cleared: false,
        });
        StateNode::announce(changed);
        Ok(())
    }

    /// Cuts `count` entries at `index` out of the list, then releases their
    /// nodes. Every removed node is released even if one of them turns out
    /// to be inconsistent; the first such problem is reported.
    fn take_references(
        &self,
        index: usize,
        count: usize,
        cleared: bool,
    ) -> Result<Vec<NodeReference>, TreeError> {
        let removed: Vec<NodeReference> = self
            .inner
            .items
            .borrow_mut()
            .drain(index..index + count)
            .collect();

        let owner = &self.inner.owner;
        owner.record(|| {
            if cleared {
                NodeChange::Clear {
                    node: owner.node,
                    feature: owner.kind,
                }
            } else {
                NodeChange::Splice {
                    node: owner.node,
                    feature: owner.kind,
                    index,
                    remove: count,
                    add: Vec::new(),
                }
            }
        });

        let mut first_error = None;
        let mut changed = Vec::new();
        for reference in &removed {
            reference.visit_or_children(&mut |node| {
                if let Err(err) = self.release(node, &mut changed) {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            });
            reference.clear_payload();
        }
        debug!(node = %owner.node, feature = %owner.kind, index, count, cleared, "children removed");

        self.inner.router.fire(ListSpliceEvent {
            index,
            removed: removed.clone(),
            added: Vec::new(),
            cleared,
        });
        StateNode::announce(changed);
        match first_error {
            Some(err) => Err(err),
            None => Ok(removed),
        }
    }

    fn release(&self, node: &StateNode, changed: &mut Vec<StateNode>) -> Result<(), TreeError> {
        let parent = node.parent();
        node.set_parent(None);
        node.detach_subtree(changed);
        match parent {
            Some(parent) if parent.id() == self.inner.owner.node => Ok(()),
            other => {
                let detail = format!(
                    "child of {} {} has parent {:?}",
                    self.inner.owner.node,
                    self.inner.owner.kind,
                    other.map(|p| p.id())
                );
                warn!(node = %node.id(), %detail, "inconsistent parent link");
                Err(TreeError::Inconsistent {
                    node: node.id(),
                    detail,
                })
            }
        }
    }

    /// Referenced nodes in list order, without registering a read.
    pub(crate) fn snapshot_nodes(&self) -> Vec<StateNode> {
        let mut nodes = Vec::new();
        for reference in self.inner.items.borrow().iter() {
            reference.visit_or_children(&mut |node| nodes.push(node.clone()));
        }
        nodes
    }

    pub(crate) fn snapshot_changes(&self) -> Vec<NodeChange> {
        let items = self.inner.items.borrow();
        if items.is_empty() {
            return Vec::new();
        }
        vec![NodeChange::Splice {
            node: self.inner.owner.node,
            feature: self.inner.owner.kind,
            index: 0,
            remove: 0,
            add: items.iter().map(NodeReference::to_change_value).collect(),
        }]
    }
}
