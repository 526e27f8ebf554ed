use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use statetree_reactive::{EventRouter, Registration, Tracker};

use super::{FeatureKind, FeatureOwner, ListSpliceEvent};
use crate::change::{ChangeValue, NodeChange};
use crate::error::TreeError;
use crate::node::{NodeId, StateNode};
use crate::value::FeatureValue;

struct ListInner {
    owner: FeatureOwner,
    items: RefCell<Vec<FeatureValue>>,
    router: EventRouter<ListSpliceEvent<FeatureValue>>,
}

/// Ordered list of scalar values, such as a class list.
#[derive(Clone)]
pub struct NodeList {
    inner: Rc<ListInner>,
}

impl PartialEq for NodeList {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeList")
            .field("node", &self.inner.owner.node)
            .field("kind", &self.inner.owner.kind)
            .field("items", &self.inner.items.borrow())
            .finish()
    }
}

impl NodeList {
    pub(crate) fn new(owner: FeatureOwner) -> Self {
        Self {
            inner: Rc::new(ListInner {
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

    pub fn size(&self, cx: &Tracker) -> usize {
        self.inner.router.register_read(cx);
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self, cx: &Tracker) -> bool {
        self.size(cx) == 0
    }

    pub fn get(&self, cx: &Tracker, index: usize) -> Result<FeatureValue, TreeError> {
        self.inner.router.register_read(cx);
        let items = self.inner.items.borrow();
        items
            .get(index)
            .cloned()
            .ok_or_else(|| self.inner.owner.out_of_range(index, items.len()))
    }

    pub fn values(&self, cx: &Tracker) -> Vec<FeatureValue> {
        self.inner.router.register_read(cx);
        self.inner.items.borrow().clone()
    }

    pub fn index_of(&self, cx: &Tracker, value: &FeatureValue) -> Option<usize> {
        self.inner.router.register_read(cx);
        self.inner.items.borrow().iter().position(|v| v == value)
    }

    pub fn contains(&self, cx: &Tracker, value: &FeatureValue) -> bool {
        self.index_of(cx, value).is_some()
    }

    pub fn add(&self, index: usize, value: impl Into<FeatureValue>) -> Result<(), TreeError> {
        let value = value.into();
        self.check_insert_index(index)?;
        self.check_value(index, &value)?;
        self.splice(index, 0, vec![value]);
        Ok(())
    }

    pub fn append(&self, value: impl Into<FeatureValue>) -> Result<(), TreeError> {
        let index = self.inner.items.borrow().len();
        self.add(index, value)
    }

    /// Appends every value, or nothing if any of them is rejected.
    pub fn add_all<V: Into<FeatureValue>>(
        &self,
        values: impl IntoIterator<Item = V>,
    ) -> Result<(), TreeError> {
        let index = self.inner.items.borrow().len();
        let values: Vec<FeatureValue> = values.into_iter().map(Into::into).collect();
        for (offset, value) in values.iter().enumerate() {
            self.check_value(index + offset, value)?;
        }
        if !values.is_empty() {
            self.splice(index, 0, values);
        }
        Ok(())
    }

    /// Replaces the value at `index`, returning the previous one.
    pub fn set(
        &self,
        index: usize,
        value: impl Into<FeatureValue>,
    ) -> Result<FeatureValue, TreeError> {
        let value = value.into();
        self.check_index(index)?;
        self.check_value(index, &value)?;
        let mut removed = self.splice(index, 1, vec![value]);
        removed.pop().ok_or_else(|| self.inner.owner.out_of_range(index, 0))
    }

    pub fn remove(&self, index: usize) -> Result<FeatureValue, TreeError> {
        self.check_index(index)?;
        let mut removed = self.splice(index, 1, Vec::new());
        removed.pop().ok_or_else(|| self.inner.owner.out_of_range(index, 0))
    }

    /// Removes the first occurrence of `value`.
    pub fn remove_value(&self, value: &FeatureValue) -> bool {
        let position = self.inner.items.borrow().iter().position(|v| v == value);
        match position {
            Some(index) => {
                self.splice(index, 1, Vec::new());
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.items.borrow_mut());
        if removed.is_empty() {
            return;
        }
        let owner = &self.inner.owner;
        owner.record(|| NodeChange::Clear {
            node: owner.node,
            feature: owner.kind,
        });
        self.inner.router.fire(ListSpliceEvent {
            index: 0,
            removed,
            added: Vec::new(),
            cleared: true,
        });
    }

    pub fn add_splice_listener(
        &self,
        listener: impl Fn(&ListSpliceEvent<FeatureValue>) + 'static,
    ) -> Registration {
        self.inner.router.add_listener(listener)
    }

    fn splice(&self, index: usize, remove: usize, added: Vec<FeatureValue>) -> Vec<FeatureValue> {
        let removed: Vec<FeatureValue> = self
            .inner
            .items
            .borrow_mut()
            .splice(index..index + remove, added.iter().cloned())
            .collect();
        let owner = &self.inner.owner;
        owner.record(|| NodeChange::Splice {
            node: owner.node,
            feature: owner.kind,
            index,
            remove,
            add: added.iter().map(ChangeValue::from).collect(),
        });
        self.inner.router.fire(ListSpliceEvent {
            index,
            removed: removed.clone(),
            added,
            cleared: false,
        });
        removed
    }

    fn check_index(&self, index: usize) -> Result<(), TreeError> {
        let size = self.inner.items.borrow().len();
        if index >= size {
            return Err(self.inner.owner.out_of_range(index, size));
        }
        Ok(())
    }

    fn check_insert_index(&self, index: usize) -> Result<(), TreeError> {
        let size = self.inner.items.borrow().len();
        if index > size {
            return Err(self.inner.owner.out_of_range(index, size));
        }
        Ok(())
    }

    fn check_value(&self, index: usize, value: &FeatureValue) -> Result<(), TreeError> {
        if value.is_primitive() {
            Ok(())
        } else {
            Err(self.inner.owner.unsupported(index.to_string()))
        }
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
            add: items.iter().map(ChangeValue::from).collect(),
        }]
    }
}
