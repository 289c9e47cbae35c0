//! Named property change events.
//!
//! Every observable attribute of a layer node has a [`NodeProperty`] name.
//! Setters compare the new value against the current one and, only when they
//! differ, publish a [`PropertyChange`] carrying both values. Structural
//! edits publish a [`NodeProperty::Children`] change with the old and new
//! child sequences.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::content::{ContentType, LayerContent};
use crate::tree::{NodeId, NodeStatus};

/// Names of the observable attributes of a layer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeProperty {
    /// Display name.
    Name,
    /// Optional label overriding the name.
    Label,
    /// Identity/content URI.
    Uri,
    /// Content type classifier.
    ContentType,
    /// Load/health status.
    Status,
    /// Enabled flag of a layer node.
    Enabled,
    /// UI expansion hint.
    Expanded,
    /// Ordered child sequence.
    Children,
    /// Whether this node or any descendant is enabled.
    AnyChildrenEnabled,
    /// Whether this node and every descendant are enabled.
    AllChildrenEnabled,
    /// Loaded layer content.
    Layer,
    /// Information page URL.
    InformationUrl,
    /// Legend image URL.
    LegendUrl,
    /// Icon URL.
    IconUrl,
}

impl NodeProperty {
    /// The property name used in change events.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Label => "label",
            Self::Uri => "uri",
            Self::ContentType => "contentType",
            Self::Status => "status",
            Self::Enabled => "enabled",
            Self::Expanded => "expanded",
            Self::Children => "children",
            Self::AnyChildrenEnabled => "anyChildrenEnabled",
            Self::AllChildrenEnabled => "allChildrenEnabled",
            Self::Layer => "layer",
            Self::InformationUrl => "informationURL",
            Self::LegendUrl => "legendURL",
            Self::IconUrl => "iconURL",
        }
    }
}

impl fmt::Display for NodeProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Old or new value carried by a [`PropertyChange`].
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// Optional text (name, label).
    Text(Option<String>),
    /// Optional URL (uri, information/legend/icon URLs).
    Url(Option<Url>),
    /// Optional content type.
    ContentType(Option<ContentType>),
    /// Boolean attributes.
    Bool(bool),
    /// Node status.
    Status(NodeStatus),
    /// Child sequence.
    Children(Vec<NodeId>),
    /// Loaded layer content, compared by identity.
    Layer(Option<Arc<dyn LayerContent>>),
}

impl PropertyValue {
    /// The boolean payload, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The child sequence payload, if this is a children value.
    pub fn as_children(&self) -> Option<&[NodeId]> {
        match self {
            Self::Children(children) => Some(children),
            _ => None,
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Url(a), Self::Url(b)) => a == b,
            (Self::ContentType(a), Self::ContentType(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Status(a), Self::Status(b)) => a == b,
            (Self::Children(a), Self::Children(b)) => a == b,
            (Self::Layer(a), Self::Layer(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

/// A change of one named property on one node.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    /// The node whose property changed.
    pub node: NodeId,
    /// Ancestors of `node` at the time of the change, nearest first.
    pub ancestors: Arc<[NodeId]>,
    /// Which property changed.
    pub property: NodeProperty,
    /// Value before the change.
    pub old: PropertyValue,
    /// Value after the change.
    pub new: PropertyValue,
}

impl PropertyChange {
    /// Whether `id` is the changed node or one of its ancestors.
    pub fn is_within(&self, id: NodeId) -> bool {
        self.node == id || self.ancestors.contains(&id)
    }
}
