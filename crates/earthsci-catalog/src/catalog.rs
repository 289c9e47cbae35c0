//! The catalog tree.
//!
//! Catalogs describe what can be added to the layer tree: folders of
//! datasets, each dataset optionally offering a layer. From the sync
//! controller's point of view a catalog is read-only; it is built once by
//! whatever parses the catalog source and then queried.

use earthsci_core::ContentType;
use slotmap::{SlotMap, new_key_type};
use url::Url;

use crate::error::{CatalogError, Result};

new_key_type! {
    /// Identifier of a node in a [`CatalogTree`].
    pub struct CatalogId;
}

/// The layer a catalog node offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    /// Where the layer definition is loaded from.
    pub uri: Url,
    /// Content type of the layer definition, if known.
    pub content_type: Option<ContentType>,
}

/// The data carried by one catalog node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Display name.
    pub name: String,
    /// Optional label shown instead of the name.
    pub label: Option<String>,
    /// Identity of the node itself (a catalog document, a dataset page).
    pub uri: Option<Url>,
    /// The layer this node offers, if any.
    pub layer: Option<LayerInfo>,
}

impl CatalogEntry {
    /// A grouping entry with no layer.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            uri: None,
            layer: None,
        }
    }

    /// An entry offering the layer at `layer_uri`.
    pub fn layer(name: impl Into<String>, layer_uri: Url, content_type: Option<ContentType>) -> Self {
        Self {
            name: name.into(),
            label: None,
            uri: None,
            layer: Some(LayerInfo {
                uri: layer_uri,
                content_type,
            }),
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the identity URI.
    pub fn with_uri(mut self, uri: Url) -> Self {
        self.uri = Some(uri);
        self
    }

    /// Whether this entry offers a layer.
    pub fn is_layer_node(&self) -> bool {
        self.layer.is_some()
    }

    /// The URI of the offered layer.
    pub fn layer_uri(&self) -> Option<&Url> {
        self.layer.as_ref().map(|l| &l.uri)
    }

    /// The label if set, otherwise the name.
    pub fn label_or_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug)]
struct CatalogNode {
    entry: CatalogEntry,
    parent: Option<CatalogId>,
    children: Vec<CatalogId>,
}

/// An arena of catalog nodes under a single root.
#[derive(Debug)]
pub struct CatalogTree {
    nodes: SlotMap<CatalogId, CatalogNode>,
    root: CatalogId,
}

impl CatalogTree {
    /// Create a catalog whose root carries `root`.
    pub fn new(root: CatalogEntry) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(CatalogNode {
            entry: root,
            parent: None,
            children: Vec::new(),
        });
        Self { nodes, root }
    }

    /// The root node.
    pub fn root(&self) -> CatalogId {
        self.root
    }

    /// Whether `id` is the root.
    pub fn is_root(&self, id: CatalogId) -> bool {
        id == self.root
    }

    /// Whether `id` names a node of this catalog.
    pub fn contains(&self, id: CatalogId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A catalog always has its root, so it is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Append a new node carrying `entry` under `parent`.
    pub fn add(&mut self, parent: CatalogId, entry: CatalogEntry) -> Result<CatalogId> {
        if !self.nodes.contains_key(parent) {
            return Err(CatalogError::InvalidNode(parent));
        }
        let id = self.nodes.insert(CatalogNode {
            entry,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// The entry of `id`, or `None` for an unknown id.
    pub fn entry(&self, id: CatalogId) -> Option<&CatalogEntry> {
        self.nodes.get(id).map(|n| &n.entry)
    }

    /// The parent of `id`; `None` for the root and for unknown ids.
    pub fn parent(&self, id: CatalogId) -> Option<CatalogId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// The children of `id`, in order. Unknown ids have none.
    pub fn children(&self, id: CatalogId) -> &[CatalogId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Whether `id` offers a layer. Unknown ids do not.
    pub fn is_layer_node(&self, id: CatalogId) -> bool {
        self.entry(id).is_some_and(CatalogEntry::is_layer_node)
    }

    /// The ancestors of `id`, root first, excluding `id` itself.
    pub fn path_to(&self, id: CatalogId) -> Vec<CatalogId> {
        let mut path = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            path.push(node);
            current = self.parent(node);
        }
        path.reverse();
        path
    }
}
