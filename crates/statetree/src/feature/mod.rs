//! Node features.
//!
//! A node declares a fixed set of features up front. Each [`FeatureKind`] has
//! a dense index used to address the node's feature slots and one of three
//! shapes:
//!
//! | Kind                | Shape       | Rust type                |
//! |---------------------|-------------|--------------------------|
//! | `ElementData`       | map         | [`NodeMap`]              |
//! | `ElementProperties` | map         | [`NodeMap`]              |
//! | `ElementAttributes` | map         | [`NodeMap`]              |
//! | `ElementChildren`   | node list   | [`NodeReferenceList`]    |
//! | `VirtualChildren`   | node list   | [`NodeReferenceList`]    |
//! | `ClassList`         | value list  | [`NodeList`]             |

mod children;
mod list;
mod map;

use std::fmt;
use std::rc::Weak;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub use children::NodeReferenceList;
pub use list::NodeList;
pub use map::{MapProperty, NodeMap, PropertyAddEvent, PropertyChangeEvent};

use crate::change::NodeChange;
use crate::error::TreeError;
use crate::node::{NodeId, NodeInner, StateNode};
use crate::tree::TreeInner;

// ── FeatureKind ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKind {
    ElementData,
    ElementProperties,
    ElementAttributes,
    ElementChildren,
    VirtualChildren,
    ClassList,
}

impl FeatureKind {
    pub const COUNT: usize = 6;

    pub const ALL: [FeatureKind; Self::COUNT] = [
        FeatureKind::ElementData,
        FeatureKind::ElementProperties,
        FeatureKind::ElementAttributes,
        FeatureKind::ElementChildren,
        FeatureKind::VirtualChildren,
        FeatureKind::ClassList,
    ];

    /// Dense slot index, `0..COUNT`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn shape(self) -> FeatureShape {
        match self {
            FeatureKind::ElementData
            | FeatureKind::ElementProperties
            | FeatureKind::ElementAttributes => FeatureShape::Map,
            FeatureKind::ElementChildren | FeatureKind::VirtualChildren => FeatureShape::NodeList,
            FeatureKind::ClassList => FeatureShape::ValueList,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::ElementData => "elementData",
            FeatureKind::ElementProperties => "elementProperties",
            FeatureKind::ElementAttributes => "elementAttributes",
            FeatureKind::ElementChildren => "elementChildren",
            FeatureKind::VirtualChildren => "virtualChildren",
            FeatureKind::ClassList => "classList",
        }
    }

    pub fn flag(self) -> FeatureSet {
        FeatureSet::from_bits_retain(1 << self.index())
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureShape {
    Map,
    ValueList,
    NodeList,
}

impl fmt::Display for FeatureShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeatureShape::Map => "map",
            FeatureShape::ValueList => "value list",
            FeatureShape::NodeList => "node list",
        })
    }
}

// ── FeatureSet ────────────────────────────────────────────────────────────

bitflags! {
    /// Features a node declares at creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureSet: u8 {
        const ELEMENT_DATA = 1 << 0;
        const ELEMENT_PROPERTIES = 1 << 1;
        const ELEMENT_ATTRIBUTES = 1 << 2;
        const ELEMENT_CHILDREN = 1 << 3;
        const VIRTUAL_CHILDREN = 1 << 4;
        const CLASS_LIST = 1 << 5;
    }
}

impl FeatureSet {
    pub fn has(self, kind: FeatureKind) -> bool {
        self.contains(kind.flag())
    }

    pub fn kinds(self) -> impl Iterator<Item = FeatureKind> {
        FeatureKind::ALL.into_iter().filter(move |k| self.has(*k))
    }
}

impl From<FeatureKind> for FeatureSet {
    fn from(kind: FeatureKind) -> Self {
        kind.flag()
    }
}

// ── Feature ───────────────────────────────────────────────────────────────

/// Where a feature lives: the owning node's id plus weak links back to the
/// node and its tree.
#[derive(Clone)]
pub(crate) struct FeatureOwner {
    pub(crate) node: NodeId,
    pub(crate) kind: FeatureKind,
    pub(crate) inner: Weak<NodeInner>,
    pub(crate) tree: Weak<TreeInner>,
}

impl FeatureOwner {
    pub(crate) fn node(&self) -> Option<StateNode> {
        StateNode::upgrade(&self.inner)
    }

    /// The owning node, for operations that have to link children to it.
    pub(crate) fn require_node(&self) -> Result<StateNode, TreeError> {
        self.node().ok_or_else(|| TreeError::Inconsistent {
            node: self.node,
            detail: format!("{} outlived its node", self.kind),
        })
    }

    pub(crate) fn owns_tree_of(&self, node: &StateNode) -> bool {
        Weak::ptr_eq(&self.tree, node.tree_weak())
    }

    pub(crate) fn record(&self, change: impl FnOnce() -> NodeChange) {
        if let Some(node) = self.node() {
            node.record(change);
        }
    }

    pub(crate) fn out_of_range(&self, index: usize, size: usize) -> TreeError {
        TreeError::IndexOutOfRange {
            node: self.node,
            feature: self.kind,
            index,
            size,
        }
    }

    pub(crate) fn unsupported(&self, key: impl Into<String>) -> TreeError {
        TreeError::UnsupportedValue {
            node: self.node,
            feature: self.kind,
            key: key.into(),
        }
    }
}

/// One instantiated feature of a node.
#[derive(Debug, Clone)]
pub enum Feature {
    Map(NodeMap),
    List(NodeList),
    Children(NodeReferenceList),
}

impl Feature {
    pub(crate) fn new(owner: FeatureOwner) -> Self {
        match owner.kind.shape() {
            FeatureShape::Map => Feature::Map(NodeMap::new(owner)),
            FeatureShape::ValueList => Feature::List(NodeList::new(owner)),
            FeatureShape::NodeList => Feature::Children(NodeReferenceList::new(owner)),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::Map(map) => map.kind(),
            Feature::List(list) => list.kind(),
            Feature::Children(children) => children.kind(),
        }
    }
}

/// Splice notification fired by list features after a mutation.
///
/// A clear is reported as a splice at index 0 removing everything, with
/// `cleared` set.
#[derive(Debug, Clone)]
pub struct ListSpliceEvent<T> {
    pub index: usize,
    pub removed: Vec<T>,
    pub added: Vec<T>,
    pub cleared: bool,
}
