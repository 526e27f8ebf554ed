//! Change records.
//!
//! Mutations of attached nodes append a [`NodeChange`] to the tree's log,
//! which a transport drains with
//! [`StateTree::collect_changes`](crate::StateTree::collect_changes). A node
//! that becomes attached first reports `attach`, then its current content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feature::FeatureKind;
use crate::node::NodeId;
use crate::value::FeatureValue;

/// Value carried by a change record. Nodes travel as ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeValue {
    Value(Value),
    Node {
        id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Composite(Vec<ChangeValue>),
}

impl From<&FeatureValue> for ChangeValue {
    fn from(value: &FeatureValue) -> Self {
        match value {
            FeatureValue::Scalar(value) => ChangeValue::Value(value.clone()),
            FeatureValue::Node(node) => ChangeValue::Node {
                id: node.id(),
                payload: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeChange {
    Attach {
        node: NodeId,
    },
    Detach {
        node: NodeId,
    },
    Put {
        node: NodeId,
        feature: FeatureKind,
        key: String,
        value: ChangeValue,
    },
    Remove {
        node: NodeId,
        feature: FeatureKind,
        key: String,
    },
    Splice {
        node: NodeId,
        feature: FeatureKind,
        index: usize,
        remove: usize,
        add: Vec<ChangeValue>,
    },
    Clear {
        node: NodeId,
        feature: FeatureKind,
    },
}

impl NodeChange {
    pub fn node(&self) -> NodeId {
        match self {
            NodeChange::Attach { node }
            | NodeChange::Detach { node }
            | NodeChange::Put { node, .. }
            | NodeChange::Remove { node, .. }
            | NodeChange::Splice { node, .. }
            | NodeChange::Clear { node, .. } => *node,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeChange::Attach { .. } => "attach",
            NodeChange::Detach { .. } => "detach",
            NodeChange::Put { .. } => "put",
            NodeChange::Remove { .. } => "remove",
            NodeChange::Splice { .. } => "splice",
            NodeChange::Clear { .. } => "clear",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_serializes_with_type_tag() {
        let change = NodeChange::Put {
            node: NodeId(3),
            feature: FeatureKind::ElementProperties,
            key: "title".into(),
            value: ChangeValue::Value(json!("hi")),
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({
                "type": "put",
                "node": 3,
                "feature": "elementProperties",
                "key": "title",
                "value": {"value": "hi"}
            })
        );
    }

    #[test]
    fn splice_of_node_references_round_trips() {
        let change = NodeChange::Splice {
            node: NodeId(1),
            feature: FeatureKind::VirtualChildren,
            index: 0,
            remove: 0,
            add: vec![ChangeValue::Node {
                id: NodeId(4),
                payload: Some(json!({"type": "inMemory"})),
            }],
        };
        let json = serde_json::to_string(&change).unwrap();
        let back: NodeChange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
        assert_eq!(back.name(), "splice");
    }
}
