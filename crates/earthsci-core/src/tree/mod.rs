//! The observable layer tree.
//!
//! A [`LayerTree`] owns an arena of layer nodes addressed by [`NodeId`]. It
//! provides:
//!
//! - Structural edits with move semantics (`add_child`, `insert_child`,
//!   `remove_child`, `remove_from_parent`, `set_children`, `destroy`)
//! - Attribute getters and change-detecting setters
//! - Three lazily built, cached aggregates per node: the renderable list,
//!   the elevation sources, and the URI index
//! - The derived `anyChildrenEnabled` / `allChildrenEnabled` pair
//! - A property-change event stream with node, subtree and tree scopes
//!
//! # Propagation
//!
//! Every structural edit fires a `children` change on the edited node and
//! then walks to the top of the tree, invalidating each node's caches and
//! refreshing its enabled aggregates. Enabled-state changes walk the same
//! path. Events are collected under the arena lock and emitted after it is
//! released, so listeners may freely read or mutate the tree.
//!
//! # Thread Safety
//!
//! `LayerTree` is a cheap, cloneable handle (`Send + Sync`). The arena sits
//! behind a `RwLock`; each node's three cache slots share one `Mutex`, so a
//! rebuild triggered from a loader thread never races a foreground read.
//!
//! # Example
//!
//! ```
//! use earthsci_core::LayerTree;
//! use url::Url;
//!
//! let tree = LayerTree::new();
//! let folder = tree.create_folder("Imagery", None);
//! let uri = Url::parse("https://example.com/landsat.xml").unwrap();
//! let layer = tree.create_layer("Landsat", Some(uri.clone()));
//!
//! tree.add_child(folder, layer).unwrap();
//! tree.add_child(tree.root(), folder).unwrap();
//!
//! assert!(tree.has_nodes_for_uri(tree.root(), &uri).unwrap());
//! assert_eq!(&*tree.renderable_list(tree.root()).unwrap(), &[layer]);
//! ```

mod aggregate;
mod arena;
mod node;

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use url::Url;

pub use node::{NodeId, NodeKind, NodeStatus, UriIndex};

use self::arena::{Arena, Changes};
use self::node::NodeData;
use crate::content::{ContentType, ElevationModel, LayerContent};
use crate::error::{TreeError, TreeResult};
use crate::logging::targets;
use crate::property::{NodeProperty, PropertyChange, PropertyValue};
use crate::signal::{ConnectionId, Signal};

/// Which changes a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerScope {
    /// Every change in the tree, detached nodes included.
    Tree,
    /// Changes of this node only.
    Node(NodeId),
    /// Changes of this node and of any node below it at the time of the
    /// change, including nodes attached after the listener was registered.
    Subtree(NodeId),
}

impl ListenerScope {
    /// Whether a change falls within this scope.
    pub fn matches(&self, change: &PropertyChange) -> bool {
        match *self {
            Self::Tree => true,
            Self::Node(id) => change.node == id,
            Self::Subtree(id) => change.is_within(id),
        }
    }
}

struct Shared {
    arena: RwLock<Arena>,
    root: NodeId,
    changed: Signal<PropertyChange>,
}

/// Handle to a shared, observable layer tree.
#[derive(Clone)]
pub struct LayerTree {
    shared: Arc<Shared>,
}

/// Non-owning handle to a [`LayerTree`].
///
/// Listeners that need to call back into the tree should capture one of
/// these instead of a `LayerTree`, otherwise the tree keeps itself alive.
#[derive(Clone)]
pub struct WeakLayerTree {
    shared: Weak<Shared>,
}

impl WeakLayerTree {
    /// Upgrade to a strong handle if the tree is still alive.
    pub fn upgrade(&self) -> Option<LayerTree> {
        self.shared.upgrade().map(|shared| LayerTree { shared })
    }
}

impl Default for LayerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerTree {
    /// Create a tree containing only its root node.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(NodeData::new(NodeKind::Root, "root".to_string(), None));
        Self {
            shared: Arc::new(Shared {
                arena: RwLock::new(arena),
                root,
                changed: Signal::new(),
            }),
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.shared.root
    }

    /// A non-owning handle to this tree.
    pub fn downgrade(&self) -> WeakLayerTree {
        WeakLayerTree {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Whether two handles refer to the same tree.
    pub fn ptr_eq(&self, other: &LayerTree) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Run a mutation under the write lock, then emit the collected changes.
    fn mutate<R, F>(&self, f: F) -> TreeResult<R>
    where
        F: FnOnce(&mut Arena, &mut Changes) -> TreeResult<R>,
    {
        let mut changes = Changes::new();
        let result = {
            let mut arena = self.shared.arena.write();
            f(&mut arena, &mut changes)
        };
        for change in &changes {
            self.shared.changed.emit_ref(change);
        }
        result
    }

    fn read<R, F>(&self, id: NodeId, f: F) -> TreeResult<R>
    where
        F: FnOnce(&NodeData) -> R,
    {
        let arena = self.shared.arena.read();
        arena.node(id).map(f)
    }

    // =========================================================================
    // Creation / destruction
    // =========================================================================

    /// Create a detached folder node.
    pub fn create_folder(&self, name: impl Into<String>, uri: Option<Url>) -> NodeId {
        self.create(NodeKind::Folder, name.into(), uri)
    }

    /// Create a detached layer node (enabled, no content yet).
    pub fn create_layer(&self, name: impl Into<String>, uri: Option<Url>) -> NodeId {
        self.create(NodeKind::Layer, name.into(), uri)
    }

    fn create(&self, kind: NodeKind, name: String, uri: Option<Url>) -> NodeId {
        self.shared.arena.write().insert(NodeData::new(kind, name, uri))
    }

    /// Destroy a node and its whole subtree, detaching it first if attached.
    ///
    /// Returns the number of nodes removed from the arena.
    pub fn destroy(&self, id: NodeId) -> TreeResult<usize> {
        if id == self.root() {
            return Err(TreeError::RootImmovable);
        }
        self.mutate(|arena, changes| arena.destroy(id, changes))
    }

    /// Whether the node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.shared.arena.read().contains(id)
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.shared.arena.read().len()
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Append `child` to `parent`'s children, moving it from any old parent.
    #[tracing::instrument(skip(self), target = "earthsci_core::tree", level = "trace")]
    pub fn add_child(&self, parent: NodeId, child: NodeId) -> TreeResult<()> {
        self.mutate(|arena, changes| arena.attach(parent, child, None, changes))
    }

    /// Insert `child` at `index` among `parent`'s children.
    pub fn insert_child(&self, parent: NodeId, index: usize, child: NodeId) -> TreeResult<()> {
        self.mutate(|arena, changes| arena.attach(parent, child, Some(index), changes))
    }

    /// Remove `child` from `parent`. Fails if it is not a child of `parent`.
    #[tracing::instrument(skip(self), target = "earthsci_core::tree", level = "trace")]
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> TreeResult<()> {
        self.mutate(|arena, changes| arena.detach(parent, child, changes))
    }

    /// Detach a node from its parent. Fails if it is not attached.
    pub fn remove_from_parent(&self, id: NodeId) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            let parent = arena.node(id)?.parent.ok_or(TreeError::NotAttached(id))?;
            arena.detach(parent, id, changes)
        })
    }

    /// Replace the ordered child sequence of `parent`.
    pub fn set_children(&self, parent: NodeId, children: Vec<NodeId>) -> TreeResult<()> {
        self.mutate(|arena, changes| arena.set_children(parent, children, changes))
    }

    /// The kind of a node.
    pub fn kind(&self, id: NodeId) -> TreeResult<NodeKind> {
        self.read(id, |d| d.kind)
    }

    /// The parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> TreeResult<Option<NodeId>> {
        self.read(id, |d| d.parent)
    }

    /// The ordered children of a node.
    pub fn children(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        self.read(id, |d| d.children.clone())
    }

    /// Number of children of a node.
    pub fn child_count(&self, id: NodeId) -> TreeResult<usize> {
        self.read(id, |d| d.children.len())
    }

    /// Whether a node has children.
    pub fn has_children(&self, id: NodeId) -> TreeResult<bool> {
        self.read(id, |d| !d.children.is_empty())
    }

    /// Whether a node is at the top of its tree (the root, or detached).
    pub fn is_top(&self, id: NodeId) -> TreeResult<bool> {
        self.read(id, |d| d.parent.is_none())
    }

    /// Ancestors from immediate parent to the top.
    pub fn ancestors(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let arena = self.shared.arena.read();
        arena.node(id)?;
        Ok(arena.ancestors(id))
    }

    /// Depth-first pre-order listing of the subtree rooted at `id`.
    pub fn depth_first_preorder(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        self.shared.arena.read().preorder(id)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// The display name.
    pub fn name(&self, id: NodeId) -> TreeResult<String> {
        self.read(id, |d| d.name.clone())
    }

    /// Set the display name.
    pub fn set_name(&self, id: NodeId, name: impl Into<String>) -> TreeResult<()> {
        let name = name.into();
        self.mutate(|arena, changes| {
            arena.replace(
                id,
                NodeProperty::Name,
                name,
                |d| &mut d.name,
                |v| PropertyValue::Text(Some(v)),
                changes,
            )?;
            Ok(())
        })
    }

    /// The label override, if any.
    pub fn label(&self, id: NodeId) -> TreeResult<Option<String>> {
        self.read(id, |d| d.label.clone())
    }

    /// Set the label. A label equal to the name collapses to no label.
    pub fn set_label(&self, id: NodeId, label: Option<String>) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            let name = &arena.node(id)?.name;
            let label = label.filter(|l| l != name);
            arena.replace(
                id,
                NodeProperty::Label,
                label,
                |d| &mut d.label,
                PropertyValue::Text,
                changes,
            )?;
            Ok(())
        })
    }

    /// The label if set, otherwise the name.
    pub fn label_or_name(&self, id: NodeId) -> TreeResult<String> {
        self.read(id, |d| d.label_or_name().to_string())
    }

    /// The node's URI.
    pub fn uri(&self, id: NodeId) -> TreeResult<Option<Url>> {
        self.read(id, |d| d.uri.clone())
    }

    /// Set the node's URI, invalidating the URI index up to the top.
    pub fn set_uri(&self, id: NodeId, uri: Option<Url>) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            let changed = arena.replace(
                id,
                NodeProperty::Uri,
                uri,
                |d| &mut d.uri,
                PropertyValue::Url,
                changes,
            )?;
            if changed {
                arena.invalidate_upward(id, |caches| caches.uri_index.invalidate())?;
            }
            Ok(())
        })
    }

    /// The node's content type.
    pub fn content_type(&self, id: NodeId) -> TreeResult<Option<ContentType>> {
        self.read(id, |d| d.content_type.clone())
    }

    /// Set the node's content type.
    pub fn set_content_type(&self, id: NodeId, content_type: Option<ContentType>) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            arena.replace(
                id,
                NodeProperty::ContentType,
                content_type,
                |d| &mut d.content_type,
                PropertyValue::ContentType,
                changes,
            )?;
            Ok(())
        })
    }

    /// The node's status.
    pub fn status(&self, id: NodeId) -> TreeResult<NodeStatus> {
        self.read(id, |d| d.status.clone())
    }

    /// Set the node's status.
    pub fn set_status(&self, id: NodeId, status: NodeStatus) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            arena.replace(
                id,
                NodeProperty::Status,
                status,
                |d| &mut d.status,
                PropertyValue::Status,
                changes,
            )?;
            Ok(())
        })
    }

    /// The enabled flag, or `None` for nodes that do not support it.
    pub fn is_enabled(&self, id: NodeId) -> TreeResult<Option<bool>> {
        self.read(id, |d| d.kind.is_enableable().then_some(d.enabled))
    }

    /// Enable or disable a layer node.
    ///
    /// Fires `enabled` on the node, then refreshes `anyChildrenEnabled` /
    /// `allChildrenEnabled` on the node and every ancestor.
    pub fn set_enabled(&self, id: NodeId, enabled: bool) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            let kind = arena.node(id)?.kind;
            if !kind.is_enableable() {
                return Err(TreeError::Unsupported {
                    kind,
                    property: NodeProperty::Enabled.name(),
                });
            }
            let changed = arena.replace(
                id,
                NodeProperty::Enabled,
                enabled,
                |d| &mut d.enabled,
                PropertyValue::Bool,
                changes,
            )?;
            if changed {
                arena.enabled_changed(id, changes)?;
            }
            Ok(())
        })
    }

    /// The UI expansion hint.
    pub fn is_expanded(&self, id: NodeId) -> TreeResult<bool> {
        self.read(id, |d| d.expanded)
    }

    /// Set the UI expansion hint.
    pub fn set_expanded(&self, id: NodeId, expanded: bool) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            arena.replace(
                id,
                NodeProperty::Expanded,
                expanded,
                |d| &mut d.expanded,
                PropertyValue::Bool,
                changes,
            )?;
            Ok(())
        })
    }

    /// The loaded content of a layer node.
    pub fn layer(&self, id: NodeId) -> TreeResult<Option<Arc<dyn LayerContent>>> {
        self.read(id, |d| d.layer.clone())
    }

    /// Attach loaded content to a layer node.
    ///
    /// Content is compared by identity; replacing it invalidates the
    /// elevation sources up to the top.
    pub fn set_layer(&self, id: NodeId, layer: Option<Arc<dyn LayerContent>>) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            let data = arena.node_mut(id)?;
            if !data.kind.is_renderable() {
                return Err(TreeError::Unsupported {
                    kind: data.kind,
                    property: NodeProperty::Layer.name(),
                });
            }
            let same = match (&data.layer, &layer) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if same {
                return Ok(());
            }
            let old = std::mem::replace(&mut data.layer, layer.clone());
            let change = arena.change(
                id,
                NodeProperty::Layer,
                PropertyValue::Layer(old),
                PropertyValue::Layer(layer),
            );
            changes.push(change);
            arena.invalidate_upward(id, |caches| caches.elevation.invalidate())
        })
    }

    /// The information page URL.
    pub fn information_url(&self, id: NodeId) -> TreeResult<Option<Url>> {
        self.read(id, |d| d.information_url.clone())
    }

    /// Set the information page URL.
    pub fn set_information_url(&self, id: NodeId, url: Option<Url>) -> TreeResult<()> {
        self.set_url_attribute(id, NodeProperty::InformationUrl, url, |d| &mut d.information_url)
    }

    /// The legend image URL.
    pub fn legend_url(&self, id: NodeId) -> TreeResult<Option<Url>> {
        self.read(id, |d| d.legend_url.clone())
    }

    /// Set the legend image URL.
    pub fn set_legend_url(&self, id: NodeId, url: Option<Url>) -> TreeResult<()> {
        self.set_url_attribute(id, NodeProperty::LegendUrl, url, |d| &mut d.legend_url)
    }

    /// The icon URL.
    pub fn icon_url(&self, id: NodeId) -> TreeResult<Option<Url>> {
        self.read(id, |d| d.icon_url.clone())
    }

    /// Set the icon URL.
    pub fn set_icon_url(&self, id: NodeId, url: Option<Url>) -> TreeResult<()> {
        self.set_url_attribute(id, NodeProperty::IconUrl, url, |d| &mut d.icon_url)
    }

    fn set_url_attribute<F>(
        &self,
        id: NodeId,
        property: NodeProperty,
        url: Option<Url>,
        field: F,
    ) -> TreeResult<()>
    where
        F: for<'a> FnOnce(&'a mut NodeData) -> &'a mut Option<Url>,
    {
        self.mutate(|arena, changes| {
            arena.replace(id, property, url, field, PropertyValue::Url, changes)?;
            Ok(())
        })
    }

    // =========================================================================
    // Enabled aggregates
    // =========================================================================

    /// Whether the node (if enableable) or any descendant is enabled.
    pub fn any_children_enabled(&self, id: NodeId) -> TreeResult<bool> {
        self.any_children_enabled_equals(id, true)
    }

    /// Whether no enableable node in the subtree is disabled.
    pub fn all_children_enabled(&self, id: NodeId) -> TreeResult<bool> {
        Ok(!self.any_children_enabled_equals(id, false)?)
    }

    /// Whether the node (if enableable) or any descendant has `enabled == value`.
    pub fn any_children_enabled_equals(&self, id: NodeId, value: bool) -> TreeResult<bool> {
        self.shared.arena.read().any_enabled_equals(id, value)
    }

    /// Set `enabled` on every enableable node of the subtree.
    pub fn enable_children(&self, id: NodeId, enabled: bool) -> TreeResult<()> {
        self.mutate(|arena, changes| {
            let subtree = arena.preorder(id)?;
            for &node in &subtree {
                if arena.node(node)?.kind.is_enableable() {
                    arena.replace(
                        node,
                        NodeProperty::Enabled,
                        enabled,
                        |d| &mut d.enabled,
                        PropertyValue::Bool,
                        changes,
                    )?;
                }
            }
            // Descendants bottom-up, then `id` and its ancestors.
            for &node in subtree.iter().skip(1).rev() {
                arena.refresh_enabled_aggregates(node, changes)?;
            }
            arena.enabled_changed(id, changes)
        })
    }

    // =========================================================================
    // Cached aggregates
    // =========================================================================

    /// Renderable leaves of the subtree, in depth-first order.
    ///
    /// Repeated calls without an intervening structural change return the
    /// same shared slice.
    pub fn renderable_list(&self, id: NodeId) -> TreeResult<Arc<[NodeId]>> {
        let arena = self.shared.arena.read();
        let mut caches = arena.node(id)?.caches.lock();
        caches
            .renderables
            .try_get_or_compute(|| {
                let list = arena.collect_renderables(id)?;
                tracing::debug!(target: targets::CACHE, ?id, len = list.len(), "rebuilt renderable list");
                Ok(Arc::from(list))
            })
            .cloned()
    }

    /// Elevation models contributed by loaded layers of the subtree.
    pub fn elevation_sources(&self, id: NodeId) -> TreeResult<Arc<[Arc<dyn ElevationModel>]>> {
        let arena = self.shared.arena.read();
        let mut caches = arena.node(id)?.caches.lock();
        caches
            .elevation
            .try_get_or_compute(|| {
                let sources = arena.collect_elevation_sources(id)?;
                tracing::debug!(target: targets::CACHE, ?id, len = sources.len(), "rebuilt elevation sources");
                Ok(Arc::from(sources))
            })
            .cloned()
    }

    /// The full URI index of the subtree.
    pub fn uri_index(&self, id: NodeId) -> TreeResult<Arc<UriIndex>> {
        let arena = self.shared.arena.read();
        let mut caches = arena.node(id)?.caches.lock();
        caches
            .uri_index
            .try_get_or_compute(|| {
                let index = arena.collect_uri_index(id)?;
                tracing::debug!(target: targets::CACHE, ?id, uris = index.len(), "rebuilt URI index");
                Ok(Arc::new(index))
            })
            .cloned()
    }

    /// Whether any node in the subtree (inclusive) reports `uri`.
    pub fn has_nodes_for_uri(&self, id: NodeId, uri: &Url) -> TreeResult<bool> {
        Ok(self.uri_index(id)?.get(uri).is_some_and(|nodes| !nodes.is_empty()))
    }

    /// Nodes in the subtree (inclusive) reporting `uri`, in depth-first order.
    pub fn nodes_for_uri(&self, id: NodeId, uri: &Url) -> TreeResult<Vec<NodeId>> {
        Ok(self.uri_index(id)?.get(uri).cloned().unwrap_or_default())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a listener for property changes within `scope`.
    pub fn connect<F>(&self, scope: ListenerScope, listener: F) -> ConnectionId
    where
        F: Fn(&PropertyChange) + Send + Sync + 'static,
    {
        self.shared.changed.connect(move |change| {
            if scope.matches(change) {
                listener(change);
            }
        })
    }

    /// Register a listener for one named property within `scope`.
    pub fn connect_property<F>(
        &self,
        scope: ListenerScope,
        property: NodeProperty,
        listener: F,
    ) -> ConnectionId
    where
        F: Fn(&PropertyChange) + Send + Sync + 'static,
    {
        self.connect(scope, move |change| {
            if change.property == property {
                listener(change);
            }
        })
    }

    /// Remove a listener.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.shared.changed.disconnect(id)
    }

    /// Suppress (or resume) all change events, e.g. during bulk restore.
    pub fn set_events_blocked(&self, blocked: bool) {
        self.shared.changed.set_blocked(blocked);
    }
}

static_assertions::assert_impl_all!(LayerTree: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn record(tree: &LayerTree, scope: ListenerScope) -> Arc<Mutex<Vec<PropertyChange>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        tree.connect(scope, move |change| log_clone.lock().push(change.clone()));
        log
    }

    #[test]
    fn test_label_collapses_to_name() {
        let tree = LayerTree::new();
        let node = tree.create_folder("Rivers", None);

        tree.set_label(node, Some("Hydrology".into())).unwrap();
        assert_eq!(tree.label_or_name(node).unwrap(), "Hydrology");

        tree.set_label(node, Some("Rivers".into())).unwrap();
        assert_eq!(tree.label(node).unwrap(), None);
        assert_eq!(tree.label_or_name(node).unwrap(), "Rivers");
    }

    #[test]
    fn test_setter_fires_only_on_change() {
        let tree = LayerTree::new();
        let node = tree.create_layer("a", None);
        let log = record(&tree, ListenerScope::Node(node));

        tree.set_name(node, "a").unwrap();
        assert!(log.lock().is_empty());

        tree.set_name(node, "b").unwrap();
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].property, NodeProperty::Name);
        assert_eq!(log[0].old, PropertyValue::Text(Some("a".into())));
        assert_eq!(log[0].new, PropertyValue::Text(Some("b".into())));
    }

    #[test]
    fn test_children_event_carries_sequences() {
        let tree = LayerTree::new();
        let root = tree.root();
        let a = tree.create_layer("a", None);
        let log = record(&tree, ListenerScope::Node(root));

        tree.add_child(root, a).unwrap();
        let children: Vec<_> = log
            .lock()
            .iter()
            .filter(|c| c.property == NodeProperty::Children)
            .cloned()
            .collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].old.as_children(), Some(&[][..]));
        assert_eq!(children[0].new.as_children(), Some(&[a][..]));
    }

    #[test]
    fn test_remove_unattached_fails_loudly() {
        let tree = LayerTree::new();
        let a = tree.create_layer("a", None);
        assert_eq!(tree.remove_from_parent(a), Err(TreeError::NotAttached(a)));
        assert_eq!(
            tree.remove_child(tree.root(), a),
            Err(TreeError::NotAChild { parent: tree.root(), child: a })
        );
    }

    #[test]
    fn test_root_cannot_be_moved_or_destroyed() {
        let tree = LayerTree::new();
        let f = tree.create_folder("f", None);
        assert_eq!(tree.add_child(f, tree.root()), Err(TreeError::RootImmovable));
        assert_eq!(tree.destroy(tree.root()), Err(TreeError::RootImmovable));
    }

    #[test]
    fn test_enabled_unsupported_on_folder() {
        let tree = LayerTree::new();
        let f = tree.create_folder("f", None);
        assert_eq!(tree.is_enabled(f).unwrap(), None);
        assert!(matches!(
            tree.set_enabled(f, false),
            Err(TreeError::Unsupported { kind: NodeKind::Folder, .. })
        ));
    }

    #[test]
    fn test_uri_change_invalidates_ancestors() {
        let tree = LayerTree::new();
        let root = tree.root();
        let a = tree.create_layer("a", Some(uri("file:///a.xml")));
        tree.add_child(root, a).unwrap();
        assert!(tree.has_nodes_for_uri(root, &uri("file:///a.xml")).unwrap());

        tree.set_uri(a, Some(uri("file:///b.xml"))).unwrap();
        assert!(!tree.has_nodes_for_uri(root, &uri("file:///a.xml")).unwrap());
        assert_eq!(tree.nodes_for_uri(root, &uri("file:///b.xml")).unwrap(), vec![a]);
    }

    #[test]
    fn test_set_children_round_trip() {
        let tree = LayerTree::new();
        let root = tree.root();
        let a = tree.create_layer("a", None);
        let b = tree.create_layer("b", None);
        let c = tree.create_folder("c", None);

        tree.set_children(root, vec![a, b]).unwrap();
        assert_eq!(tree.children(root).unwrap(), vec![a, b]);

        tree.set_children(root, vec![b, c]).unwrap();
        assert_eq!(tree.children(root).unwrap(), vec![b, c]);
        assert_eq!(tree.parent(a).unwrap(), None);
        assert_eq!(tree.parent(c).unwrap(), Some(root));
        assert_eq!(
            tree.set_children(root, vec![b, b]),
            Err(TreeError::DuplicateChild(b))
        );
    }

    #[test]
    fn test_enable_children_sets_whole_subtree() {
        let tree = LayerTree::new();
        let root = tree.root();
        let f = tree.create_folder("f", None);
        let a = tree.create_layer("a", None);
        let b = tree.create_layer("b", None);
        tree.add_child(root, f).unwrap();
        tree.add_child(f, a).unwrap();
        tree.add_child(f, b).unwrap();

        tree.enable_children(root, false).unwrap();
        assert_eq!(tree.is_enabled(a).unwrap(), Some(false));
        assert_eq!(tree.is_enabled(b).unwrap(), Some(false));
        assert!(!tree.any_children_enabled(root).unwrap());

        tree.set_enabled(a, true).unwrap();
        assert!(tree.any_children_enabled(f).unwrap());
        assert!(!tree.all_children_enabled(f).unwrap());
    }

    #[test]
    fn test_weak_handle() {
        let tree = LayerTree::new();
        let weak = tree.downgrade();
        assert!(weak.upgrade().is_some_and(|t| t.ptr_eq(&tree)));
        drop(tree);
        assert!(weak.upgrade().is_none());
    }
}
