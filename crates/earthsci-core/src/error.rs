//! Error types for the layer model.

use url::Url;

use crate::tree::{NodeId, NodeKind};

/// Errors raised by structural misuse of the layer tree.
///
/// These indicate programmer errors (stale ids, detaching something that is
/// not attached, cycles) and are always reported, never absorbed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The node ID is invalid or the node has been destroyed.
    #[error("Invalid or destroyed node ID {0:?}")]
    InvalidNode(NodeId),

    /// Attempted to make a node its own ancestor.
    #[error("Cannot attach node {child:?} beneath its own descendant {parent:?}")]
    CircularParentage {
        /// The node being attached.
        child: NodeId,
        /// The intended parent.
        parent: NodeId,
    },

    /// The node has no parent to be detached from.
    #[error("Node {0:?} is not attached to a parent")]
    NotAttached(NodeId),

    /// The node is not a child of the given parent.
    #[error("Node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// The supposed parent.
        parent: NodeId,
        /// The node that was not found among its children.
        child: NodeId,
    },

    /// The tree root cannot be attached beneath another node or destroyed.
    #[error("The tree root cannot be moved or destroyed")]
    RootImmovable,

    /// Child insertion index out of range.
    #[error("Index {index} out of range for {len} children")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of children.
        len: usize,
    },

    /// A children list contained the same node twice.
    #[error("Node {0:?} appears more than once in the children list")]
    DuplicateChild(NodeId),

    /// The attribute is not supported by this kind of node.
    #[error("{kind:?} nodes do not support the '{property}' attribute")]
    Unsupported {
        /// The kind of node addressed.
        kind: NodeKind,
        /// The attribute name.
        property: &'static str,
    },
}

/// Result type for tree operations.
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Reasons a layer load can fail.
///
/// These end up inside [`NodeStatus::Error`](crate::NodeStatus::Error), so
/// they are cheap to clone and comparable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The resolver produced a value of an unexpected kind and nobody can
    /// handle it.
    #[error("Expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected kind name.
        expected: String,
        /// Produced kind name.
        got: String,
    },

    /// The resolver completed without producing a value.
    #[error("Intent produced null result")]
    EmptyResult,

    /// The load was canceled before completion.
    #[error("Load canceled")]
    Canceled,

    /// The resolver failed.
    #[error("{0}")]
    Resolver(String),

    /// The node has no URI to load from.
    #[error("Node {0:?} has no URI to load from")]
    MissingUri(NodeId),

    /// No resolution function is registered for the request.
    #[error("No resolver registered for {0}")]
    NoHandler(Url),
}

/// Umbrella error for the crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Tree-related error.
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    /// Load-related error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// A specialized Result type for layer model operations.
pub type Result<T> = std::result::Result<T, Error>;
