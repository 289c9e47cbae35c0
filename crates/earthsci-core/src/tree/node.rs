//! Per-node storage of the layer tree arena.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::new_key_type;
use url::Url;

use crate::cache::Cached;
use crate::content::{ContentType, ElevationModel, LayerContent};
use crate::error::LoadError;

new_key_type! {
    /// Stable identifier of a node in a [`LayerTree`](super::LayerTree).
    ///
    /// Ids stay valid while the node moves around the tree and while it is
    /// detached; they become invalid once the node is destroyed.
    pub struct NodeId;
}

/// The kind of a layer tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The single root of a tree.
    Root,
    /// A grouping node.
    Folder,
    /// A renderable leaf backed by layer content.
    Layer,
}

impl NodeKind {
    /// Whether nodes of this kind carry an `enabled` flag.
    pub const fn is_enableable(self) -> bool {
        matches!(self, Self::Layer)
    }

    /// Whether nodes of this kind contribute to the renderable list.
    pub const fn is_renderable(self) -> bool {
        matches!(self, Self::Layer)
    }
}

/// Health of a node, typically written by the load state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeStatus {
    /// Nothing wrong.
    #[default]
    Ok,
    /// Something failed for this node.
    Error {
        /// Human-readable message.
        message: String,
        /// Underlying cause, if known.
        cause: Option<LoadError>,
    },
}

impl NodeStatus {
    /// An `Ok` status.
    pub const fn ok() -> Self {
        Self::Ok
    }

    /// An error status whose message is taken from `cause`.
    pub fn from_error(cause: LoadError) -> Self {
        Self::Error {
            message: cause.to_string(),
            cause: Some(cause),
        }
    }

    /// An error status with a message and no cause.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            cause: None,
        }
    }

    /// Whether this is `Ok`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The error message, if this is an error.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Error { message, .. } => Some(message),
        }
    }

    /// The error cause, if this is an error with a cause.
    pub fn cause(&self) -> Option<&LoadError> {
        match self {
            Self::Ok => None,
            Self::Error { cause, .. } => cause.as_ref(),
        }
    }
}

/// URI to nodes index of a subtree, in depth-first order.
pub type UriIndex = HashMap<Url, Vec<NodeId>>;

/// The three derived aggregates of a node, guarded together.
#[derive(Default)]
pub(crate) struct NodeCaches {
    pub(crate) renderables: Cached<Arc<[NodeId]>>,
    pub(crate) elevation: Cached<Arc<[Arc<dyn ElevationModel>]>>,
    pub(crate) uri_index: Cached<Arc<UriIndex>>,
}

impl NodeCaches {
    pub(crate) fn invalidate_all(&mut self) {
        self.renderables.invalidate();
        self.elevation.invalidate();
        self.uri_index.invalidate();
    }
}

/// Data stored in the arena for each node.
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    pub(crate) label: Option<String>,
    pub(crate) uri: Option<Url>,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) status: NodeStatus,
    pub(crate) enabled: bool,
    pub(crate) expanded: bool,
    pub(crate) layer: Option<Arc<dyn LayerContent>>,
    pub(crate) information_url: Option<Url>,
    pub(crate) legend_url: Option<Url>,
    pub(crate) icon_url: Option<Url>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Last reported `anyChildrenEnabled`.
    pub(crate) last_any_enabled: bool,
    /// Last reported `allChildrenEnabled`.
    pub(crate) last_all_enabled: bool,
    pub(crate) caches: Mutex<NodeCaches>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, name: String, uri: Option<Url>) -> Self {
        let enabled = kind.is_enableable();
        Self {
            kind,
            name,
            label: None,
            uri,
            content_type: None,
            status: NodeStatus::Ok,
            enabled,
            expanded: false,
            layer: None,
            information_url: None,
            legend_url: None,
            icon_url: None,
            parent: None,
            children: Vec::new(),
            // A fresh node has no children: any/all reflect only itself.
            last_any_enabled: enabled,
            last_all_enabled: true,
            caches: Mutex::new(NodeCaches::default()),
        }
    }

    pub(crate) fn label_or_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}
