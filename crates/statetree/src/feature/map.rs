use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;
use statetree_reactive::{EventRouter, Registration, Tracker};
use tracing::trace;

use super::{FeatureKind, FeatureOwner};
use crate::change::{ChangeValue, NodeChange};
use crate::config::ValueChangePolicy;
use crate::error::TreeError;
use crate::node::{NodeId, NodeInner, StateNode};
use crate::value::FeatureValue;

// ── Events ────────────────────────────────────────────────────────────────

/// Fired by a [`NodeMap`] when a property slot is created.
#[derive(Debug, Clone)]
pub struct PropertyAddEvent {
    pub property: MapProperty,
}

/// Fired by a [`MapProperty`] when its value is set or removed.
#[derive(Debug, Clone)]
pub struct PropertyChangeEvent {
    pub property: MapProperty,
    pub old_value: Option<FeatureValue>,
    pub new_value: Option<FeatureValue>,
}

// ── MapProperty ───────────────────────────────────────────────────────────

/// Slot content. Nodes are held weakly: a property pointing at its own node
/// or at an ancestor must not keep that subtree alive.
#[derive(Debug)]
enum StoredValue {
    Scalar(Value),
    Node(NodeId, Weak<NodeInner>),
}

impl StoredValue {
    fn new(value: &FeatureValue) -> Self {
        match value {
            FeatureValue::Scalar(value) => StoredValue::Scalar(value.clone()),
            FeatureValue::Node(node) => StoredValue::Node(node.id(), node.downgrade()),
        }
    }

    /// The stored value, or `None` for a node that no longer exists.
    fn load(&self) -> Option<FeatureValue> {
        match self {
            StoredValue::Scalar(value) => Some(FeatureValue::Scalar(value.clone())),
            StoredValue::Node(_, node) => StateNode::upgrade(node).map(FeatureValue::Node),
        }
    }

    fn same_as(&self, value: &FeatureValue) -> bool {
        match (self, value) {
            (StoredValue::Scalar(stored), FeatureValue::Scalar(value)) => stored == value,
            (StoredValue::Node(_, stored), FeatureValue::Node(node)) => {
                Weak::ptr_eq(stored, &node.downgrade())
            }
            _ => false,
        }
    }

    fn to_change_value(&self) -> ChangeValue {
        match self {
            StoredValue::Scalar(value) => ChangeValue::Value(value.clone()),
            StoredValue::Node(id, _) => ChangeValue::Node {
                id: *id,
                payload: None,
            },
        }
    }
}

struct PropertyInner {
    name: String,
    map: Weak<MapInner>,
    owner: FeatureOwner,
    value: RefCell<Option<StoredValue>>,
    router: EventRouter<PropertyChangeEvent>,
}

/// One named slot of a [`NodeMap`].
///
/// A slot may be empty, which is different from holding `null`. Once
/// created, the same slot is returned for its name for the lifetime of the
/// map. A node value does not keep its node alive; once every other handle
/// to it is gone the slot reads as empty.
#[derive(Clone)]
pub struct MapProperty {
    inner: Rc<PropertyInner>,
}

impl PartialEq for MapProperty {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MapProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapProperty")
            .field("node", &self.inner.owner.node)
            .field("name", &self.inner.name)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

impl MapProperty {
    fn new(name: &str, map: Weak<MapInner>, owner: FeatureOwner) -> Self {
        Self {
            inner: Rc::new(PropertyInner {
                name: name.to_owned(),
                map,
                owner,
                value: RefCell::new(None),
                router: EventRouter::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn map(&self) -> Option<NodeMap> {
        self.inner.map.upgrade().map(|inner| NodeMap { inner })
    }

    pub fn value(&self, cx: &Tracker) -> Option<FeatureValue> {
        self.inner.router.register_read(cx);
        self.load()
    }

    pub fn has_value(&self, cx: &Tracker) -> bool {
        self.value(cx).is_some()
    }

    /// Stores `value` and fires a change event.
    ///
    /// Under [`ValueChangePolicy::SkipUnchanged`] an equal value is ignored.
    pub fn set_value(&self, value: impl Into<FeatureValue>) -> Result<(), TreeError> {
        let value = value.into();
        self.check_value(&value)?;

        let policy = self
            .inner
            .owner
            .node()
            .map(|node| node.value_change_policy())
            .unwrap_or_default();
        if policy == ValueChangePolicy::SkipUnchanged
            && self
                .inner
                .value
                .borrow()
                .as_ref()
                .is_some_and(|stored| stored.same_as(&value))
        {
            return Ok(());
        }

        let old_value = self
            .inner
            .value
            .replace(Some(StoredValue::new(&value)))
            .and_then(|stored| stored.load());
        let owner = &self.inner.owner;
        owner.record(|| NodeChange::Put {
            node: owner.node,
            feature: owner.kind,
            key: self.inner.name.clone(),
            value: ChangeValue::from(&value),
        });
        self.inner.router.fire(PropertyChangeEvent {
            property: self.clone(),
            old_value,
            new_value: Some(value),
        });
        Ok(())
    }

    /// Empties the slot. Returns `false`, firing nothing, if it held no
    /// value.
    pub fn remove_value(&self) -> bool {
        let Some(old_value) = self.inner.value.borrow_mut().take() else {
            return false;
        };
        let old_value = old_value.load();
        let owner = &self.inner.owner;
        owner.record(|| NodeChange::Remove {
            node: owner.node,
            feature: owner.kind,
            key: self.inner.name.clone(),
        });
        self.inner.router.fire(PropertyChangeEvent {
            property: self.clone(),
            old_value,
            new_value: None,
        });
        true
    }

    pub fn add_change_listener(
        &self,
        listener: impl Fn(&PropertyChangeEvent) + 'static,
    ) -> Registration {
        self.inner.router.add_listener(listener)
    }

    /// Change listener that goes away when the tracker's computation is
    /// invalidated.
    pub fn add_scoped_change_listener(
        &self,
        cx: &Tracker,
        listener: impl Fn(&PropertyChangeEvent) + 'static,
    ) -> Registration {
        self.inner.router.add_scoped_listener(cx, listener)
    }

    fn check_value(&self, value: &FeatureValue) -> Result<(), TreeError> {
        let owner = &self.inner.owner;
        match value {
            FeatureValue::Node(node) if !owner.owns_tree_of(node) => {
                Err(TreeError::ForeignNode { node: node.id() })
            }
            FeatureValue::Node(_) => Ok(()),
            scalar if scalar.is_primitive() => Ok(()),
            _ => Err(owner.unsupported(self.inner.name.as_str())),
        }
    }

    fn snapshot_change(&self) -> Option<NodeChange> {
        let owner = &self.inner.owner;
        self.inner
            .value
            .borrow()
            .as_ref()
            .map(|value| NodeChange::Put {
                node: owner.node,
                feature: owner.kind,
                key: self.inner.name.clone(),
                value: value.to_change_value(),
            })
    }

    fn load(&self) -> Option<FeatureValue> {
        self.inner.value.borrow().as_ref().and_then(StoredValue::load)
    }
}

// ── NodeMap ───────────────────────────────────────────────────────────────

struct MapInner {
    owner: FeatureOwner,
    properties: RefCell<IndexMap<String, MapProperty>>,
    added: EventRouter<PropertyAddEvent>,
}

/// Map feature: named properties, created on first access and kept in
/// creation order.
#[derive(Clone)]
pub struct NodeMap {
    inner: Rc<MapInner>,
}

impl PartialEq for NodeMap {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NodeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeMap")
            .field("node", &self.inner.owner.node)
            .field("kind", &self.inner.owner.kind)
            .field("properties", &self.inner.properties.borrow().len())
            .finish()
    }
}

impl NodeMap {
    pub(crate) fn new(owner: FeatureOwner) -> Self {
        Self {
            inner: Rc::new(MapInner {
                owner,
                properties: RefCell::new(IndexMap::new()),
                added: EventRouter::new(),
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

    /// Returns the property slot for `name`, creating it (and firing a
    /// [`PropertyAddEvent`]) if needed.
    pub fn get_property(&self, name: &str) -> Result<MapProperty, TreeError> {
        if name.is_empty() {
            return Err(TreeError::EmptyPropertyName {
                node: self.inner.owner.node,
                feature: self.inner.owner.kind,
            });
        }
        let existing = self.inner.properties.borrow().get(name).cloned();
        if let Some(property) = existing {
            return Ok(property);
        }

        let property = MapProperty::new(name, Rc::downgrade(&self.inner), self.inner.owner.clone());
        self.inner
            .properties
            .borrow_mut()
            .insert(name.to_owned(), property.clone());
        trace!(node = %self.inner.owner.node, feature = %self.inner.owner.kind, name, "property created");
        self.inner.added.fire(PropertyAddEvent {
            property: property.clone(),
        });
        Ok(property)
    }

    /// True if a slot exists for `name`, with or without a value.
    pub fn contains_property(&self, name: &str) -> bool {
        self.inner.properties.borrow().contains_key(name)
    }

    /// Number of slots, with or without a value.
    pub fn property_count(&self) -> usize {
        self.inner.properties.borrow().len()
    }

    /// Visits every slot once, in creation order. Slots created later
    /// invalidate the tracker's computation.
    pub fn for_each_property(&self, cx: &Tracker, mut visitor: impl FnMut(&str, &MapProperty)) {
        self.inner.added.register_read(cx);
        let properties: Vec<MapProperty> =
            self.inner.properties.borrow().values().cloned().collect();
        for property in &properties {
            visitor(property.name(), property);
        }
    }

    /// Names of the slots that currently hold a value.
    pub fn property_names(&self, cx: &Tracker) -> Vec<String> {
        let mut names = Vec::new();
        self.for_each_property(cx, |name, property| {
            if property.has_value(cx) {
                names.push(name.to_owned());
            }
        });
        names
    }

    pub fn has_property_value(&self, cx: &Tracker, name: &str) -> bool {
        match self.existing(name) {
            Some(property) => property.has_value(cx),
            None => {
                self.inner.added.register_read(cx);
                false
            }
        }
    }

    /// Reads a value without creating the slot.
    pub fn get_property_value(&self, cx: &Tracker, name: &str) -> Option<FeatureValue> {
        match self.existing(name) {
            Some(property) => property.value(cx),
            None => {
                self.inner.added.register_read(cx);
                None
            }
        }
    }

    pub fn set_property(
        &self,
        name: &str,
        value: impl Into<FeatureValue>,
    ) -> Result<(), TreeError> {
        self.get_property(name)?.set_value(value)
    }

    /// Empties the slot for `name`. The slot itself stays.
    pub fn remove_property(&self, name: &str) -> bool {
        self.existing(name)
            .is_some_and(|property| property.remove_value())
    }

    /// Empties every slot. Returns how many held a value.
    pub fn remove_all_properties(&self) -> usize {
        let properties: Vec<MapProperty> =
            self.inner.properties.borrow().values().cloned().collect();
        properties
            .iter()
            .filter(|property| property.remove_value())
            .count()
    }

    pub fn add_property_add_listener(
        &self,
        listener: impl Fn(&PropertyAddEvent) + 'static,
    ) -> Registration {
        self.inner.added.add_listener(listener)
    }

    fn existing(&self, name: &str) -> Option<MapProperty> {
        self.inner.properties.borrow().get(name).cloned()
    }

    pub(crate) fn snapshot_changes(&self) -> Vec<NodeChange> {
        self.inner
            .properties
            .borrow()
            .values()
            .filter_map(MapProperty::snapshot_change)
            .collect()
    }
}
