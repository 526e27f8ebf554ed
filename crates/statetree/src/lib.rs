//! Retained state tree.
//!
//! A [`StateTree`] owns [`StateNode`]s, each carrying a fixed set of
//! [features](feature): property maps, value lists and child reference
//! lists. Reads take a [`Tracker`] and register reactive dependencies;
//! mutations fire change events, propagate attach/detach through child
//! lists and, for attached nodes, append [`NodeChange`] records that a
//! transport can drain.
//!
//! ```
//! use statetree::{FeatureSet, StateTree, Tracker};
//!
//! let tree = StateTree::new();
//! let child = tree.create_node(FeatureSet::ELEMENT_PROPERTIES);
//! child.element_properties()?.set_property("title", "hello")?;
//! tree.root().element_children()?.append(&child)?;
//!
//! assert!(child.is_attached());
//! let title = child
//!     .element_properties()?
//!     .get_property_value(&Tracker::untracked(), "title");
//! assert_eq!(title.as_ref().and_then(|v| v.as_str()), Some("hello"));
//! # Ok::<(), statetree::TreeError>(())
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod feature;
pub mod node;
pub mod reference;
pub mod tree;
pub mod value;

pub use change::{ChangeValue, NodeChange};
pub use config::{TreeConfig, ValueChangePolicy};
pub use error::{ConfigError, TreeError};
pub use feature::{
    Feature, FeatureKind, FeatureSet, FeatureShape, ListSpliceEvent, MapProperty, NodeList,
    NodeMap, NodeReferenceList, PropertyAddEvent, PropertyChangeEvent,
};
pub use node::{NodeId, NodeLifecycleEvent, StateNode};
pub use reference::{DirectReference, NodeReference};
pub use tree::StateTree;
pub use value::FeatureValue;

pub use statetree_reactive::{Computation, FlushStats, Reactive, Registration, Tracker};
