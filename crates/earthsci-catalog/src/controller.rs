//! Keeping the catalog and the layer tree in step.
//!
//! The [`SyncController`] answers "is this catalog node already in the layer
//! tree?" for the catalog browser, adds catalog nodes to the layer tree
//! (optionally recreating their folder path), and removes them again
//! (optionally deleting folders the removal leaves empty).
//!
//! Both optional behaviours are gated by a [`UserActionPreference`]. When the
//! stored preference is `Ask`, the controller consults its
//! [`PolicyResolver`] once per operation; a remembered answer is written
//! back to the preference store, any other answer is kept for the lifetime
//! of the controller.

use std::collections::HashMap;
use std::sync::Arc;

use earthsci_core::{AutoPrompt, LayerTree, NodeId, NodeKind, PerfSpan, TreeResult};
use parking_lot::Mutex;
use url::Url;

use crate::catalog::{CatalogEntry, CatalogId, CatalogTree};
use crate::error::Result;
use crate::insert::{CatalogLayerInserter, LayerInserter, create_folder_node};
use crate::preferences::{
    PolicyGate, PolicyResolver, PreferenceStore, PromptPolicyResolver, SharedPreferences,
    UserActionPreference,
};
use crate::targets;

/// Builder for [`SyncController`].
pub struct SyncControllerBuilder {
    tree: LayerTree,
    preferences: Option<Arc<dyn PreferenceStore>>,
    policy: Option<Arc<dyn PolicyResolver>>,
    inserter: Option<Arc<dyn LayerInserter>>,
}

impl SyncControllerBuilder {
    /// Where gate answers are read from and remembered to.
    ///
    /// Defaults to an in-memory [`SharedPreferences`] with every gate on `Ask`.
    pub fn preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Who decides a gate whose preference is `Ask`.
    ///
    /// Defaults to answering no without asking. Gate resolution is
    /// serialized per controller: the resolver, and the preference store
    /// when an answer is remembered, run while other callers wait, so
    /// neither may call back into this controller.
    pub fn policy_resolver(mut self, policy: Arc<dyn PolicyResolver>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// How catalog nodes become layer tree nodes.
    ///
    /// Defaults to a [`CatalogLayerInserter`] without a loader.
    pub fn inserter(mut self, inserter: Arc<dyn LayerInserter>) -> Self {
        self.inserter = Some(inserter);
        self
    }

    /// Build the controller.
    pub fn build(self) -> SyncController {
        SyncController {
            tree: self.tree,
            preferences: self
                .preferences
                .unwrap_or_else(|| Arc::new(SharedPreferences::default()) as Arc<dyn PreferenceStore>),
            policy: self.policy.unwrap_or_else(|| {
                Arc::new(PromptPolicyResolver::new(Arc::new(AutoPrompt::declining())))
                    as Arc<dyn PolicyResolver>
            }),
            inserter: self
                .inserter
                .unwrap_or_else(|| Arc::new(CatalogLayerInserter::new()) as Arc<dyn LayerInserter>),
            session: Mutex::new(HashMap::new()),
        }
    }
}

/// Reconciles catalog nodes with the current layer tree.
pub struct SyncController {
    tree: LayerTree,
    preferences: Arc<dyn PreferenceStore>,
    policy: Arc<dyn PolicyResolver>,
    inserter: Arc<dyn LayerInserter>,
    session: Mutex<HashMap<PolicyGate, bool>>,
}

impl SyncController {
    /// Start building a controller for `tree`.
    pub fn builder(tree: LayerTree) -> SyncControllerBuilder {
        SyncControllerBuilder {
            tree,
            preferences: None,
            policy: None,
            inserter: None,
        }
    }

    /// A controller for `tree` with default collaborators.
    pub fn new(tree: LayerTree) -> Self {
        Self::builder(tree).build()
    }

    /// The layer tree being kept in step.
    pub fn tree(&self) -> &LayerTree {
        &self.tree
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether any node of the layer tree has the URI `layer_uri`.
    pub fn exists_in_layer_model(&self, layer_uri: &Url) -> bool {
        self.tree
            .has_nodes_for_uri(self.tree.root(), layer_uri)
            .unwrap_or(false)
    }

    /// Whether every layer offered by `nodes`, or anywhere beneath them, is
    /// in the layer tree. True for an empty list.
    pub fn all_exist_in_layer_model(&self, catalog: &CatalogTree, nodes: &[CatalogId]) -> bool {
        nodes.iter().all(|&node| self.all_exist_below(catalog, node))
    }

    /// Whether any layer offered by `nodes`, or anywhere beneath them, is in
    /// the layer tree. False for an empty list.
    pub fn any_exist_in_layer_model(&self, catalog: &CatalogTree, nodes: &[CatalogId]) -> bool {
        nodes.iter().any(|&node| self.any_exist_below(catalog, node))
    }

    /// Whether every known node in `nodes` offers a layer.
    pub fn are_all_layer_nodes(&self, catalog: &CatalogTree, nodes: &[CatalogId]) -> bool {
        nodes
            .iter()
            .filter(|&&node| catalog.contains(node))
            .all(|&node| catalog.is_layer_node(node))
    }

    /// Catalog label decoration: `text` with a trailing `*` when `node`
    /// offers a layer that is already in the layer tree.
    pub fn decorate_text(&self, text: &str, catalog: &CatalogTree, node: CatalogId) -> Option<String> {
        let uri = catalog.entry(node)?.layer_uri()?;
        self.exists_in_layer_model(uri).then(|| format!("{text}*"))
    }

    fn all_exist_below(&self, catalog: &CatalogTree, node: CatalogId) -> bool {
        if let Some(uri) = catalog.entry(node).and_then(CatalogEntry::layer_uri) {
            if !self.exists_in_layer_model(uri) {
                return false;
            }
        }
        catalog
            .children(node)
            .iter()
            .all(|&child| self.all_exist_below(catalog, child))
    }

    fn any_exist_below(&self, catalog: &CatalogTree, node: CatalogId) -> bool {
        if let Some(uri) = catalog.entry(node).and_then(CatalogEntry::layer_uri) {
            if self.exists_in_layer_model(uri) {
                return true;
            }
        }
        catalog
            .children(node)
            .iter()
            .any(|&child| self.any_exist_below(catalog, child))
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Add `nodes` to the layer tree, returning the layer tree node created
    /// for each.
    ///
    /// When the full path is required, each node is placed beneath folders
    /// mirroring its catalog ancestors, reusing existing layer tree nodes
    /// with the same URI. Otherwise nodes are added directly under the root.
    /// Unknown catalog ids are skipped.
    pub fn add_to_layer_model(&self, catalog: &CatalogTree, nodes: &[CatalogId]) -> Result<Vec<NodeId>> {
        let _perf = PerfSpan::new("catalog.add_to_layer_model");
        let nodes = known_nodes(catalog, nodes);
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let full_path = self.decide(PolicyGate::FullPathRequired);
        let mut inserted = Vec::with_capacity(nodes.len());
        for node in nodes {
            let parent = if full_path {
                self.create_node_path(catalog, node)?
            } else {
                self.tree.root()
            };
            inserted.push(self.inserter.insert(&self.tree, parent, catalog, node)?);
        }
        tracing::debug!(target: targets::SYNC, count = inserted.len(), full_path, "added catalog nodes");
        Ok(inserted)
    }

    /// Remove the layers offered by `nodes` from the layer tree, returning
    /// how many layer tree nodes were detached.
    ///
    /// Every node with the offered layer URI is detached. If that leaves a
    /// folder empty, emptied folders are pruned when the user wants them
    /// deleted; the question is asked at most once per call.
    pub fn remove_from_layer_model(&self, catalog: &CatalogTree, nodes: &[CatalogId]) -> Result<usize> {
        let _perf = PerfSpan::new("catalog.remove_from_layer_model");
        let root = self.tree.root();
        let mut delete_empty_folders = None;
        let mut removed = 0;

        for node in known_nodes(catalog, nodes) {
            let Some(uri) = catalog.entry(node).and_then(CatalogEntry::layer_uri) else {
                continue;
            };
            for layer in self.tree.nodes_for_uri(root, uri)? {
                let Some(parent) = self.tree.parent(layer)? else {
                    continue;
                };
                self.tree.remove_from_parent(layer)?;
                removed += 1;

                if self.tree.kind(parent)? == NodeKind::Folder && !self.tree.has_children(parent)? {
                    let delete = *delete_empty_folders
                        .get_or_insert_with(|| self.decide(PolicyGate::DeleteEmptyFolders));
                    if delete {
                        self.prune_empty_folders(parent)?;
                    }
                }
            }
        }
        tracing::debug!(target: targets::SYNC, removed, "removed catalog layers");
        Ok(removed)
    }

    /// Forget gate answers given during this session.
    pub fn forget_session_answers(&self) {
        self.session.lock().clear();
    }

    /// The layer tree node under which `node` goes when its full path is
    /// required.
    fn create_node_path(&self, catalog: &CatalogTree, node: CatalogId) -> Result<NodeId> {
        let mut parent = self.tree.root();
        let mut missing = Vec::new();
        let mut current = catalog.parent(node);
        while let Some(ancestor) = current {
            if catalog.is_root(ancestor) {
                break;
            }
            if let Some(existing) = self.existing_node(catalog, ancestor)? {
                parent = existing;
                break;
            }
            missing.push(ancestor);
            current = catalog.parent(ancestor);
        }

        for ancestor in missing.into_iter().rev() {
            let Some(entry) = catalog.entry(ancestor) else {
                continue;
            };
            if entry.is_layer_node() {
                continue;
            }
            let folder = create_folder_node(&self.tree, entry)?;
            self.tree.add_child(parent, folder)?;
            tracing::trace!(target: targets::SYNC, name = %entry.name, "created path folder");
            parent = folder;
        }
        Ok(parent)
    }

    /// The first layer tree node sharing the identity URI of `node`.
    fn existing_node(&self, catalog: &CatalogTree, node: CatalogId) -> TreeResult<Option<NodeId>> {
        let Some(uri) = catalog.entry(node).and_then(|e| e.uri.as_ref()) else {
            return Ok(None);
        };
        Ok(self.tree.nodes_for_uri(self.tree.root(), uri)?.first().copied())
    }

    /// Detach `node`, or the highest ancestor that would be left empty.
    fn prune_empty_folders(&self, node: NodeId) -> TreeResult<()> {
        let mut current = node;
        while let Some(parent) = self.tree.parent(current)? {
            if self.tree.child_count(parent)? > 1 || self.tree.kind(parent)? != NodeKind::Folder {
                tracing::trace!(target: targets::SYNC, ?current, "pruning empty folder");
                return self.tree.remove_from_parent(current);
            }
            current = parent;
        }
        Ok(())
    }

    /// Resolve `gate` from the stored preference, this session's answers or
    /// the policy resolver, in that order.
    fn decide(&self, gate: PolicyGate) -> bool {
        // Held until the answer is stored so concurrent callers ask once.
        let mut session = self.session.lock();
        if let Some(decision) = self.preferences.preference(gate).decision() {
            return decision;
        }
        if let Some(&decision) = session.get(&gate) {
            return decision;
        }

        let answer = self.policy.resolve(gate);
        tracing::debug!(target: targets::PREFERENCES, ?gate, yes = answer.yes, remember = answer.remember, "gate resolved");
        if answer.remember {
            self.preferences
                .set_preference(gate, UserActionPreference::from_answer(answer.yes));
        } else {
            session.insert(gate, answer.yes);
        }
        answer.yes
    }
}

fn known_nodes(catalog: &CatalogTree, nodes: &[CatalogId]) -> Vec<CatalogId> {
    nodes
        .iter()
        .copied()
        .filter(|&node| {
            let known = catalog.contains(node);
            if !known {
                tracing::debug!(target: targets::SYNC, ?node, "skipping unknown catalog node");
            }
            known
        })
        .collect()
}
