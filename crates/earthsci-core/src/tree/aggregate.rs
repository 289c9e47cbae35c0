//! Rebuild walks for the cached per-node aggregates.
//!
//! Each aggregate is rebuilt in full by a depth-first pre-order walk of the
//! subtree, the node itself included.

use std::sync::Arc;

use super::arena::Arena;
use super::node::{NodeId, UriIndex};
use crate::content::ElevationModel;
use crate::error::TreeResult;

impl Arena {
    /// Renderable leaves of the subtree rooted at `id`.
    pub(crate) fn collect_renderables(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let mut result = Vec::new();
        self.walk(id, &mut |node_id, arena| {
            if arena.node(node_id)?.kind.is_renderable() {
                result.push(node_id);
            }
            Ok(())
        })?;
        Ok(result)
    }

    /// Elevation models exposed by loaded layers in the subtree rooted at `id`.
    pub(crate) fn collect_elevation_sources(
        &self,
        id: NodeId,
    ) -> TreeResult<Vec<Arc<dyn ElevationModel>>> {
        let mut result = Vec::new();
        self.walk(id, &mut |node_id, arena| {
            let data = arena.node(node_id)?;
            if data.kind.is_renderable() {
                if let Some(model) = data.layer.as_ref().and_then(|l| l.elevation_model()) {
                    result.push(model);
                }
            }
            Ok(())
        })?;
        Ok(result)
    }

    /// URI index of the subtree rooted at `id`.
    pub(crate) fn collect_uri_index(&self, id: NodeId) -> TreeResult<UriIndex> {
        let mut index = UriIndex::new();
        self.walk(id, &mut |node_id, arena| {
            if let Some(uri) = &arena.node(node_id)?.uri {
                index.entry(uri.clone()).or_default().push(node_id);
            }
            Ok(())
        })?;
        Ok(index)
    }

    fn walk<F>(&self, id: NodeId, visit: &mut F) -> TreeResult<()>
    where
        F: FnMut(NodeId, &Arena) -> TreeResult<()>,
    {
        visit(id, self)?;
        for &child in &self.node(id)?.children {
            self.walk(child, visit)?;
        }
        Ok(())
    }
}
