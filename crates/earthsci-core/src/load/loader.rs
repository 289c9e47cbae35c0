//! The layer load state machine.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use url::Url;

use super::{Dispatcher, LoadOutcome, LoadRequest, LoadState, ResolveCallback, ResolveHandle, Resolver};
use crate::content::Resolved;
use crate::error::{LoadError, Result, TreeError, TreeResult};
use crate::logging::targets;
use crate::notification::{Notification, NotificationCategory, NotificationSink, TracingSink};
use crate::prompt::Prompt;
use crate::tree::{LayerTree, NodeId, NodeStatus};

const UNKNOWN_LAYER_TITLE: &str = "Unknown layer type";
const FAILED_LOAD_TITLE: &str = "Failed to load layer";

/// One load intent: the request plus the node awaiting its result.
struct Intent {
    node: NodeId,
    request: LoadRequest,
    state: Mutex<LoadState>,
    /// Set by the first terminal delivery; later deliveries are dropped.
    delivered: AtomicBool,
    resolve_handle: Mutex<Option<ResolveHandle>>,
}

/// Handle to a started load.
#[derive(Clone)]
pub struct LoadHandle {
    intent: Arc<Intent>,
}

impl LoadHandle {
    /// The node being loaded.
    pub fn node(&self) -> NodeId {
        self.intent.node
    }

    /// The submitted request.
    pub fn request(&self) -> &LoadRequest {
        &self.intent.request
    }

    /// Current state of the intent.
    pub fn state(&self) -> LoadState {
        *self.intent.state.lock()
    }

    /// Whether a terminal outcome has been applied.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// The resolver's handle for this load.
    pub fn resolve_handle(&self) -> Option<ResolveHandle> {
        *self.intent.resolve_handle.lock()
    }
}

impl fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandle")
            .field("node", &self.intent.node)
            .field("uri", &self.intent.request.uri.as_str())
            .field("state", &self.state())
            .finish()
    }
}

struct LoaderInner {
    tree: LayerTree,
    resolver: Arc<dyn Resolver>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    prompt: Option<Arc<dyn Prompt>>,
    notifications: Arc<dyn NotificationSink>,
}

/// Drives layer nodes from a URI to loaded content.
///
/// `LayerLoader` is cheap to clone; clones share collaborators.
///
/// # Example
///
/// ```ignore
/// let loader = LayerLoader::builder(tree.clone(), resolver)
///     .dispatcher(dispatcher)
///     .prompt(prompt)
///     .notifications(log)
///     .build();
/// let handle = loader.start(layer)?;
/// ```
#[derive(Clone)]
pub struct LayerLoader {
    inner: Arc<LoaderInner>,
}

/// Builder for [`LayerLoader`].
pub struct LayerLoaderBuilder {
    tree: LayerTree,
    resolver: Arc<dyn Resolver>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    prompt: Option<Arc<dyn Prompt>>,
    notifications: Option<Arc<dyn NotificationSink>>,
}

impl LayerLoaderBuilder {
    /// Registry for values of an unexpected kind. Without one, such values
    /// are reported as type mismatches.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Prompt used to confirm redispatching. Without one, nothing is
    /// redispatched.
    ///
    /// The prompt is consulted on the resolver's callback thread, after the
    /// node has been detached and before the load is recorded as finished.
    /// With a [`WorkerResolver`](crate::WorkerResolver) a blocking prompt
    /// stalls every other queued load until it returns.
    pub fn prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Where load failures are reported. Defaults to the log only.
    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    /// Build the loader.
    pub fn build(self) -> LayerLoader {
        LayerLoader {
            inner: Arc::new(LoaderInner {
                tree: self.tree,
                resolver: self.resolver,
                dispatcher: self.dispatcher,
                prompt: self.prompt,
                notifications: self.notifications.unwrap_or_else(|| Arc::new(TracingSink)),
            }),
        }
    }
}

impl LayerLoader {
    /// Start building a loader for `tree` that resolves through `resolver`.
    pub fn builder(tree: LayerTree, resolver: Arc<dyn Resolver>) -> LayerLoaderBuilder {
        LayerLoaderBuilder {
            tree,
            resolver,
            dispatcher: None,
            prompt: None,
            notifications: None,
        }
    }

    /// A loader with no dispatcher or prompt, reporting to the log only.
    pub fn new(tree: LayerTree, resolver: Arc<dyn Resolver>) -> Self {
        Self::builder(tree, resolver).build()
    }

    /// The tree this loader writes to.
    pub fn tree(&self) -> &LayerTree {
        &self.inner.tree
    }

    /// Submit a load for `node` built from its URI and content type.
    ///
    /// Returns immediately; the outcome is applied when the resolver reports
    /// back. Fails without submitting anything if the node has no URI.
    #[tracing::instrument(skip(self), target = "earthsci_core::load", level = "debug")]
    pub fn start(&self, node: NodeId) -> Result<LoadHandle> {
        let tree = &self.inner.tree;
        let uri = tree.uri(node)?.ok_or(LoadError::MissingUri(node))?;
        let request = LoadRequest::layer(uri, tree.content_type(node)?);

        let intent = Arc::new(Intent {
            node,
            request: request.clone(),
            state: Mutex::new(LoadState::Pending),
            delivered: AtomicBool::new(false),
            resolve_handle: Mutex::new(None),
        });

        let inner = self.inner.clone();
        let target = intent.clone();
        let callback: ResolveCallback = Arc::new(move |outcome| inner.deliver(&target, outcome));

        // Loading before submit: a resolver may report synchronously.
        *intent.state.lock() = LoadState::Loading;
        let handle = self.inner.resolver.submit(request, callback);
        *intent.resolve_handle.lock() = Some(handle);

        tracing::debug!(target: targets::LOAD, ?node, %handle, "load submitted");
        Ok(LoadHandle { intent })
    }

    /// Ask the resolver to cancel a load. The node is left untouched until
    /// the resolver confirms with a `Canceled` outcome.
    pub fn cancel(&self, handle: &LoadHandle) -> bool {
        if handle.is_finished() {
            return false;
        }
        match handle.resolve_handle() {
            Some(resolve) => self.inner.resolver.cancel(resolve),
            None => false,
        }
    }

    /// Ask the resolver to abandon a load; on confirmation the node is
    /// detached.
    pub fn abort(&self, handle: &LoadHandle) -> bool {
        if handle.is_finished() {
            return false;
        }
        match handle.resolve_handle() {
            Some(resolve) => self.inner.resolver.abort(resolve),
            None => false,
        }
    }
}

impl LoaderInner {
    fn deliver(&self, intent: &Intent, outcome: LoadOutcome) {
        if intent.delivered.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                target: targets::LOAD,
                node = ?intent.node,
                ?outcome,
                "ignoring duplicate load outcome"
            );
            return;
        }

        let state = match outcome {
            LoadOutcome::Completed { uri, result } => self.completed(intent, uri, result),
            LoadOutcome::Errored(cause) => self.errored(intent, cause),
            LoadOutcome::Canceled => self.canceled(intent),
            LoadOutcome::Aborted => self.aborted(intent),
        };
        *intent.state.lock() = state;
        tracing::debug!(target: targets::LOAD, node = ?intent.node, ?state, "load finished");
    }

    fn completed(&self, intent: &Intent, uri: Url, result: Option<Resolved>) -> LoadState {
        let node = intent.node;
        match result {
            Some(Resolved::Layer(content)) => {
                self.apply("set status", self.tree.set_status(node, NodeStatus::ok()));
                self.apply("attach layer", self.tree.set_layer(node, Some(content)));
                self.apply("set uri", self.tree.set_uri(node, Some(uri)));
                LoadState::Completed
            }
            Some(value) => {
                self.detach(node);
                let handler = self
                    .dispatcher
                    .as_ref()
                    .and_then(|d| d.find_handler(&value).map(|info| (d, info)));
                match handler {
                    Some((dispatcher, info)) => {
                        let message = format!(
                            "The resource at {} is not a layer. Open it with {}?",
                            intent.request.uri, info.name
                        );
                        let accepted = self
                            .prompt
                            .as_ref()
                            .is_some_and(|p| p.confirm(UNKNOWN_LAYER_TITLE, &message));
                        if accepted {
                            tracing::debug!(target: targets::LOAD, handler = %info.name, "redispatching load result");
                            dispatcher.dispatch(value, &uri);
                        }
                        LoadState::Completed
                    }
                    None => self.errored(
                        intent,
                        LoadError::TypeMismatch {
                            expected: intent.request.expected.to_string(),
                            got: value.kind().to_string(),
                        },
                    ),
                }
            }
            None => self.errored(intent, LoadError::EmptyResult),
        }
    }

    fn errored(&self, intent: &Intent, cause: LoadError) -> LoadState {
        let message = format!("Failed to load layer from {}: {}", intent.request.uri, cause);
        self.apply(
            "set error status",
            self.tree.set_status(intent.node, NodeStatus::from_error(cause.clone())),
        );
        tracing::error!(target: targets::LOAD, node = ?intent.node, error = %cause, "{message}");
        self.notifications.report(
            Notification::error(FAILED_LOAD_TITLE, message)
                .with_category(NotificationCategory::FileIo)
                .with_cause(cause),
        );
        LoadState::Errored
    }

    fn canceled(&self, intent: &Intent) -> LoadState {
        self.apply(
            "set canceled status",
            self.tree.set_status(intent.node, NodeStatus::from_error(LoadError::Canceled)),
        );
        LoadState::Canceled
    }

    fn aborted(&self, intent: &Intent) -> LoadState {
        self.detach(intent.node);
        LoadState::Aborted
    }

    fn detach(&self, node: NodeId) {
        match self.tree.remove_from_parent(node) {
            Ok(()) | Err(TreeError::NotAttached(_)) => {}
            Err(err) => self.apply("detach node", Err(err)),
        }
    }

    /// Tree writes from a load can fail if the node was destroyed meanwhile.
    fn apply(&self, what: &str, result: TreeResult<()>) {
        if let Err(err) = result {
            tracing::warn!(target: targets::LOAD, %err, "load could not {what}");
        }
    }
}
