//! Document operation errors.

use crate::node::NodeId;

/// Result type for document operations.
pub type DomResult<T> = Result<T, DomError>;

/// Errors from document operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("node is detached: {0}")]
    Detached(NodeId),

    #[error("not an element: {0}")]
    NotAnElement(NodeId),

    #[error("cannot insert {child} into {parent}")]
    Hierarchy { parent: NodeId, child: NodeId },
}
