//! Core layer model for EarthSci.
//!
//! This crate provides the foundational pieces of the layer model:
//!
//! - **Layer Tree**: an observable arena tree of root, folder and layer nodes
//! - **Cached Aggregates**: renderable list, elevation sources and URI index,
//!   built lazily per node and invalidated up the tree on every edit
//! - **Signal/Slot System**: synchronous, re-entrant change notification
//! - **Load State Machine**: asynchronous population of layer nodes through a
//!   pluggable resolver, with a threaded resolver included
//! - **Notifications**: user-facing failure reports
//!
//! # Layer Tree Example
//!
//! ```
//! use earthsci_core::{LayerTree, ListenerScope, NodeProperty};
//!
//! let tree = LayerTree::new();
//! let folder = tree.create_folder("Bathymetry", None);
//! let layer = tree.create_layer("Gebco", None);
//! tree.add_child(tree.root(), folder).unwrap();
//! tree.add_child(folder, layer).unwrap();
//!
//! // Hear about enabled-state changes anywhere under the root.
//! tree.connect_property(
//!     ListenerScope::Subtree(tree.root()),
//!     NodeProperty::AnyChildrenEnabled,
//!     |change| println!("{:?} now {:?}", change.node, change.new),
//! );
//!
//! tree.set_enabled(layer, false).unwrap();
//! assert!(!tree.any_children_enabled(tree.root()).unwrap());
//! ```
//!
//! # Signal Example
//!
//! ```
//! use earthsci_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//! let conn_id = value_changed.connect(|value| println!("Value changed to: {}", value));
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```

pub mod cache;
mod content;
mod error;
pub mod load;
pub mod logging;
pub mod notification;
pub mod prompt;
pub mod property;
pub mod signal;
pub mod tree;
pub mod worker;

pub use content::{ContentType, DispatchValue, ElevationModel, LayerContent, Resolved, ValueKind};
pub use error::{Error, LoadError, Result, TreeError, TreeResult};
pub use load::{
    Dispatcher, HandlerInfo, LayerLoader, LoadHandle, LoadOutcome, LoadRequest, LoadState,
    ResolveCallback, ResolveHandle, Resolver,
};
pub use logging::{LayerTreeDebug, PerfSpan, TreeFormatOptions, TreeStyle};
pub use notification::{
    Notification, NotificationCategory, NotificationLog, NotificationSink, Severity,
};
pub use prompt::{AutoPrompt, Prompt, PromptAnswer};
pub use property::{NodeProperty, PropertyChange, PropertyValue};
pub use signal::{ConnectionId, Signal};
pub use tree::{LayerTree, ListenerScope, NodeId, NodeKind, NodeStatus, UriIndex, WeakLayerTree};
pub use worker::{WorkerResolver, WorkerResolverBuilder, WorkerResolverConfig};
