use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::change::ChangeValue;
use crate::node::StateNode;

/// Entry of a child list: either one node or a group of references.
///
/// Clones share the payload slot, so a caller holding a reference sees the
/// payload cleared once the entry leaves its list.
#[derive(Debug, Clone)]
pub enum NodeReference {
    Direct(DirectReference),
    Composite(Vec<NodeReference>),
}

#[derive(Debug, Clone)]
pub struct DirectReference {
    node: StateNode,
    payload: Rc<RefCell<Option<Value>>>,
}

impl PartialEq for DirectReference {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && Rc::ptr_eq(&self.payload, &other.payload)
    }
}

impl PartialEq for NodeReference {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeReference::Direct(a), NodeReference::Direct(b)) => a == b,
            (NodeReference::Composite(a), NodeReference::Composite(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&StateNode> for NodeReference {
    fn from(node: &StateNode) -> Self {
        NodeReference::direct(node)
    }
}

impl NodeReference {
    pub fn direct(node: &StateNode) -> Self {
        Self::with_payload(node, None)
    }

    pub fn with_payload(node: &StateNode, payload: Option<Value>) -> Self {
        NodeReference::Direct(DirectReference {
            node: node.clone(),
            payload: Rc::new(RefCell::new(payload)),
        })
    }

    pub fn composite(references: impl IntoIterator<Item = NodeReference>) -> Self {
        NodeReference::Composite(references.into_iter().collect())
    }

    /// The node of a direct reference.
    pub fn get(&self) -> Option<&StateNode> {
        match self {
            NodeReference::Direct(direct) => Some(&direct.node),
            NodeReference::Composite(_) => None,
        }
    }

    pub fn payload(&self) -> Option<Value> {
        match self {
            NodeReference::Direct(direct) => direct.payload.borrow().clone(),
            NodeReference::Composite(_) => None,
        }
    }

    /// Visits the node of a direct reference, or every node reachable
    /// through a composite one, depth first.
    pub fn visit_or_children<F: FnMut(&StateNode)>(&self, visitor: &mut F) {
        match self {
            NodeReference::Direct(direct) => visitor(&direct.node),
            NodeReference::Composite(children) => {
                for child in children {
                    child.visit_or_children(visitor);
                }
            }
        }
    }

    pub fn nodes(&self) -> Vec<StateNode> {
        let mut nodes = Vec::new();
        self.visit_or_children(&mut |node| nodes.push(node.clone()));
        nodes
    }

    pub(crate) fn clear_payload(&self) {
        match self {
            NodeReference::Direct(direct) => {
                direct.payload.borrow_mut().take();
            }
            NodeReference::Composite(children) => children.iter().for_each(Self::clear_payload),
        }
    }

    pub(crate) fn to_change_value(&self) -> ChangeValue {
        match self {
            NodeReference::Direct(direct) => ChangeValue::Node {
                id: direct.node.id(),
                payload: direct.payload.borrow().clone(),
            },
            NodeReference::Composite(children) => {
                ChangeValue::Composite(children.iter().map(Self::to_change_value).collect())
            }
        }
    }
}
