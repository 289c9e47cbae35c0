//! Asynchronous population of layer nodes.
//!
//! A load turns a layer node's URI and content type into loaded
//! [`LayerContent`](crate::LayerContent) via an external [`Resolver`]. Each
//! load is a one-shot intent driven through a small state machine:
//!
//! ```text
//! Pending -> Loading -> Completed
//!                    -> Errored
//!                    -> Canceled
//!                    -> Aborted
//! ```
//!
//! The resolver reports back with a [`LoadOutcome`] on whatever thread it
//! likes; the [`LayerLoader`] applies exactly one terminal outcome per intent
//! to the node and ignores any further deliveries.

mod loader;

use std::fmt;
use std::sync::Arc;

use url::Url;

pub use loader::{LayerLoader, LayerLoaderBuilder, LoadHandle};

use crate::content::{ContentType, Resolved, ValueKind};
use crate::error::LoadError;

/// State of a single load intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Created, not yet submitted.
    Pending,
    /// Submitted to the resolver, awaiting an outcome.
    Loading,
    /// The resolver produced a value that was applied or redispatched.
    Completed,
    /// The load failed; the node carries an error status.
    Errored,
    /// The load was canceled; the node carries an error status.
    Canceled,
    /// The load was superseded; the node was detached.
    Aborted,
}

impl LoadState {
    /// Whether no further transition can happen.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Loading)
    }
}

/// What a resolver is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Where to load from.
    pub uri: Url,
    /// Content type hint, if known.
    pub content_type: Option<ContentType>,
    /// The kind of value expected back.
    pub expected: ValueKind,
}

impl LoadRequest {
    /// A request for layer content.
    pub fn layer(uri: Url, content_type: Option<ContentType>) -> Self {
        Self {
            uri,
            content_type,
            expected: ValueKind::Layer,
        }
    }
}

/// Terminal outcome of a resolution, as reported by a resolver.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Resolution finished. `uri` is the resolver's (possibly normalized)
    /// URI; `result` is `None` if nothing was produced.
    Completed {
        /// Normalized URI of the resolved content.
        uri: Url,
        /// The produced value.
        result: Option<Resolved>,
    },
    /// Resolution failed.
    Errored(LoadError),
    /// Resolution was canceled on request.
    Canceled,
    /// Resolution was abandoned; the requester should disappear.
    Aborted,
}

impl LoadOutcome {
    /// A completed outcome carrying layer content or another value.
    pub fn completed(uri: Url, result: Option<Resolved>) -> Self {
        Self::Completed { uri, result }
    }
}

/// Identifies one submission to a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolveHandle(u64);

impl ResolveHandle {
    /// Wrap a raw handle value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResolveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receives the outcome of a submission. May be called on any thread.
pub type ResolveCallback = Arc<dyn Fn(LoadOutcome) + Send + Sync>;

/// Turns load requests into values, out of band.
pub trait Resolver: Send + Sync {
    /// Queue a request. `callback` must eventually receive one terminal
    /// outcome; `submit` itself must not block on I/O.
    fn submit(&self, request: LoadRequest, callback: ResolveCallback) -> ResolveHandle;

    /// Ask for a submission to be canceled. Returns `false` if the handle is
    /// unknown or already finished.
    fn cancel(&self, handle: ResolveHandle) -> bool;

    /// Ask for a submission to be abandoned. Resolvers without a distinct
    /// abort treat it as a cancel.
    fn abort(&self, handle: ResolveHandle) -> bool {
        self.cancel(handle)
    }
}

/// A handler able to take a redispatched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    /// Human-readable handler name, shown when asking for confirmation.
    pub name: String,
}

impl HandlerInfo {
    /// Create handler info with a display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Routes values that were not what their requester expected.
pub trait Dispatcher: Send + Sync {
    /// Find a handler for `value`, if any.
    fn find_handler(&self, value: &Resolved) -> Option<HandlerInfo>;

    /// Hand `value`, resolved from `uri`, to its handler as a new action.
    fn dispatch(&self, value: Resolved, uri: &Url);
}
