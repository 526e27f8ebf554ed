use serde_json::Value;

use crate::node::StateNode;

/// A value stored in a map property or a value list.
///
/// Scalars are JSON primitives (`null`, booleans, numbers, strings). Map
/// properties may also hold a node of the same tree; such a reference does
/// not make the node a child.
#[derive(Debug, Clone)]
pub enum FeatureValue {
    Scalar(Value),
    Node(StateNode),
}

impl PartialEq for FeatureValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FeatureValue::Scalar(a), FeatureValue::Scalar(b)) => a == b,
            (FeatureValue::Node(a), FeatureValue::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl FeatureValue {
    pub fn null() -> Self {
        FeatureValue::Scalar(Value::Null)
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FeatureValue::Scalar(value) => Some(value),
            FeatureValue::Node(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    pub fn as_node(&self) -> Option<&StateNode> {
        match self {
            FeatureValue::Node(node) => Some(node),
            FeatureValue::Scalar(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FeatureValue::Scalar(Value::Null))
    }

    /// Arrays and objects are not storable; structure goes through nodes.
    pub(crate) fn is_primitive(&self) -> bool {
        match self {
            FeatureValue::Scalar(value) => !matches!(value, Value::Array(_) | Value::Object(_)),
            FeatureValue::Node(_) => false,
        }
    }
}

impl From<Value> for FeatureValue {
    fn from(value: Value) -> Self {
        FeatureValue::Scalar(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Scalar(Value::from(value))
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Scalar(Value::from(value))
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Scalar(Value::from(value))
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Scalar(Value::from(value))
    }
}

impl From<i32> for FeatureValue {
    fn from(value: i32) -> Self {
        FeatureValue::Scalar(Value::from(value))
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Scalar(Value::from(value))
    }
}

impl From<StateNode> for FeatureValue {
    fn from(node: StateNode) -> Self {
        FeatureValue::Node(node)
    }
}

impl From<&StateNode> for FeatureValue {
    fn from(node: &StateNode) -> Self {
        FeatureValue::Node(node.clone())
    }
}
