//! Loaded content attached to layer nodes, and values produced by resolvers.
//!
//! Rendering is done elsewhere; the layer model only needs to know whether a
//! piece of content is a layer, and whether that layer can act as a source
//! of terrain elevation.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Identifier of a content type (e.g. `"au.gov.ga.earthsci.layer.definition"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentType(String);

impl ContentType {
    /// Create a content type from its identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The content type identifier.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentType {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A terrain-height source contributed by a layer.
pub trait ElevationModel: Send + Sync + fmt::Debug {
    /// Display name of the model.
    fn name(&self) -> &str;

    /// Elevation in metres at the given position, if covered.
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64>;
}

/// Concrete layer content backing a layer node.
pub trait LayerContent: Send + Sync + fmt::Debug {
    /// Display name reported by the content itself.
    fn name(&self) -> &str;

    /// The elevation model exposed by this layer, if it is an elevation layer.
    fn elevation_model(&self) -> Option<Arc<dyn ElevationModel>> {
        None
    }
}

/// The kind of value a load request expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A [`LayerContent`].
    Layer,
    /// Anything else, named by the resolver.
    Other(&'static str),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layer => f.write_str("Layer"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A value produced by a resolver that is not layer content.
///
/// Such values can only be handled by redispatching them to whichever
/// handler the dispatch registry finds for them.
pub trait DispatchValue: Any + Send + Sync + fmt::Debug {
    /// Name of the value's kind, used in messages and handler lookup.
    fn kind_name(&self) -> &'static str;

    /// Access for downcasting by handlers.
    fn as_any(&self) -> &dyn Any;
}

/// A resolved value, as delivered to the load state machine.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Layer content.
    Layer(Arc<dyn LayerContent>),
    /// Some other recognized value.
    Other(Arc<dyn DispatchValue>),
}

impl Resolved {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Layer(_) => ValueKind::Layer,
            Self::Other(value) => ValueKind::Other(value.kind_name()),
        }
    }
}
