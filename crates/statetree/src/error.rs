use statetree_reactive::ReactiveError;
use thiserror::Error;

use crate::feature::{FeatureKind, FeatureShape};
use crate::node::NodeId;

/// Errors raised by tree and feature operations.
///
/// Every variant names the node (and feature, where one is involved) the
/// operation was applied to. Mutations validate before touching state, so a
/// returned error means nothing changed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("index {index} out of range for {feature} of node {node} (size {size})")]
    IndexOutOfRange {
        node: NodeId,
        feature: FeatureKind,
        index: usize,
        size: usize,
    },
    #[error("node {node} already has parent {parent}")]
    AlreadyHasParent { node: NodeId, parent: NodeId },
    #[error("adding node {node} under {parent} would create a cycle")]
    WouldCreateCycle { node: NodeId, parent: NodeId },
    #[error("root node {node} cannot become a child")]
    RootNotInsertable { node: NodeId },
    #[error("node {node} belongs to another tree")]
    ForeignNode { node: NodeId },
    #[error("node {node} does not declare feature {feature}")]
    FeatureNotDeclared { node: NodeId, feature: FeatureKind },
    #[error("feature {feature} of node {node} is not a {expected}")]
    FeatureShapeMismatch {
        node: NodeId,
        feature: FeatureKind,
        expected: FeatureShape,
    },
    #[error("empty property name in {feature} of node {node}")]
    EmptyPropertyName { node: NodeId, feature: FeatureKind },
    #[error("unsupported value for {feature}[{key}] of node {node}")]
    UnsupportedValue {
        node: NodeId,
        feature: FeatureKind,
        key: String,
    },
    #[error("entry {index} of {feature} in node {node} is not a direct node reference")]
    NotDirectReference {
        node: NodeId,
        feature: FeatureKind,
        index: usize,
    },
    #[error("tree inconsistency at node {node}: {detail}")]
    Inconsistent { node: NodeId, detail: String },
    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}

/// Failure to load a [`TreeConfig`](crate::TreeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tree config: {0}")]
    Toml(#[from] toml::de::Error),
}
