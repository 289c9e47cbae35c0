//! Turning catalog nodes into layer tree nodes.

use earthsci_core::{LayerLoader, LayerTree, NodeId};

use crate::catalog::{CatalogEntry, CatalogId, CatalogTree};
use crate::error::{CatalogError, Result};
use crate::targets;

/// Inserts a catalog node, and everything beneath it, into a layer tree.
pub trait LayerInserter: Send + Sync {
    /// Insert `node` of `catalog` as the last child of `parent`, returning
    /// the layer tree node created for it.
    fn insert(
        &self,
        tree: &LayerTree,
        parent: NodeId,
        catalog: &CatalogTree,
        node: CatalogId,
    ) -> Result<NodeId>;
}

/// The default insertion routine.
///
/// A layer entry becomes a layer node pointing at the offered layer, and a
/// load is started for it when a loader is configured. Any other entry
/// becomes a folder whose children are inserted recursively.
#[derive(Clone, Default)]
pub struct CatalogLayerInserter {
    loader: Option<LayerLoader>,
}

impl CatalogLayerInserter {
    /// An inserter that creates placeholder layer nodes without loading them.
    pub fn new() -> Self {
        Self::default()
    }

    /// An inserter that starts a load for every layer node it creates.
    pub fn with_loader(loader: LayerLoader) -> Self {
        Self {
            loader: Some(loader),
        }
    }

    fn insert_layer(&self, tree: &LayerTree, parent: NodeId, entry: &CatalogEntry) -> Result<NodeId> {
        let info = entry.layer.as_ref();
        let node = tree.create_layer(entry.name.clone(), info.map(|l| l.uri.clone()));
        tree.set_label(node, entry.label.clone())?;
        tree.set_content_type(node, info.and_then(|l| l.content_type.clone()))?;
        tree.add_child(parent, node)?;

        if let Some(loader) = &self.loader {
            loader.start(node)?;
        }
        Ok(node)
    }
}

/// Create a detached folder node mirroring a catalog entry.
pub fn create_folder_node(tree: &LayerTree, entry: &CatalogEntry) -> Result<NodeId> {
    let folder = tree.create_folder(entry.name.clone(), entry.uri.clone());
    tree.set_label(folder, entry.label.clone())?;
    Ok(folder)
}

impl LayerInserter for CatalogLayerInserter {
    fn insert(
        &self,
        tree: &LayerTree,
        parent: NodeId,
        catalog: &CatalogTree,
        node: CatalogId,
    ) -> Result<NodeId> {
        let entry = catalog.entry(node).ok_or(CatalogError::InvalidNode(node))?;
        if entry.is_layer_node() {
            return self.insert_layer(tree, parent, entry);
        }

        let folder = create_folder_node(tree, entry)?;
        tree.add_child(parent, folder)?;
        for &child in catalog.children(node) {
            self.insert(tree, folder, catalog, child)?;
        }
        tracing::trace!(target: targets::SYNC, name = %entry.name, children = catalog.children(node).len(), "inserted catalog folder");
        Ok(folder)
    }
}
