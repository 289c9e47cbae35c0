//! A resolver that runs resolution functions on a dedicated thread.
//!
//! [`WorkerResolver`] owns one background thread fed by a bounded task
//! queue. Resolution functions are registered per content type, with a
//! per-URI-scheme fallback. Each submission receives exactly one
//! [`LoadOutcome`] through its callback, on the worker thread.
//!
//! # Cancellation
//!
//! `cancel` and `abort` mark a submission. A submission still in the queue
//! is never run; it reports `Canceled` or `Aborted` when dequeued. A
//! submission already running can observe the request through its
//! [`CancellationToken`]; whatever it returns is then replaced by the
//! requested outcome.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use earthsci_core::load::{LoadOutcome, LoadRequest, Resolver};
//! use earthsci_core::worker::{CancellationToken, Resolution, WorkerResolver};
//!
//! let resolver = WorkerResolver::builder().name("layer-loader").build();
//! resolver.register_scheme("file", |request: &LoadRequest, _token: &CancellationToken| {
//!     Ok(Resolution::new(request.uri.clone(), None))
//! });
//!
//! let uri = url::Url::parse("file:///tmp/layer.xml").unwrap();
//! resolver.submit(
//!     LoadRequest::layer(uri, None),
//!     Arc::new(|outcome: LoadOutcome| println!("{outcome:?}")),
//! );
//! resolver.stop_and_join();
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::{Mutex, RwLock};
use url::Url;

use crate::content::{ContentType, Resolved};
use crate::error::LoadError;
use crate::load::{LoadOutcome, LoadRequest, ResolveCallback, ResolveHandle, Resolver};
use crate::logging::targets;

/// Default capacity for the resolver's task queue.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

const NOT_INTERRUPTED: u8 = 0;
const CANCEL_REQUESTED: u8 = 1;
const ABORT_REQUESTED: u8 = 2;

/// Lets a running resolution function notice cancel or abort requests.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<AtomicU8>,
}

impl CancellationToken {
    /// Create a token with no request pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation or abort has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) != NOT_INTERRUPTED
    }

    /// Whether abort, specifically, has been requested.
    pub fn is_aborted(&self) -> bool {
        self.state.load(Ordering::Acquire) == ABORT_REQUESTED
    }

    /// Request cancellation. Has no effect after an abort request.
    pub fn cancel(&self) {
        let _ = self.state.compare_exchange(
            NOT_INTERRUPTED,
            CANCEL_REQUESTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Request abort. Overrides an earlier cancel request.
    pub fn abort(&self) {
        self.state.store(ABORT_REQUESTED, Ordering::Release);
    }

    fn interruption(&self) -> Option<LoadOutcome> {
        match self.state.load(Ordering::Acquire) {
            CANCEL_REQUESTED => Some(LoadOutcome::Canceled),
            ABORT_REQUESTED => Some(LoadOutcome::Aborted),
            _ => None,
        }
    }
}

/// What a resolution function produced.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Normalized URI of the produced value.
    pub uri: Url,
    /// The value, or `None` if nothing was produced.
    pub value: Option<Resolved>,
}

impl Resolution {
    /// Create a resolution.
    pub fn new(uri: Url, value: Option<Resolved>) -> Self {
        Self { uri, value }
    }
}

/// A registered resolution function.
pub type ResolveFn =
    Arc<dyn Fn(&LoadRequest, &CancellationToken) -> Result<Resolution, LoadError> + Send + Sync>;

/// Configuration for creating a [`WorkerResolver`].
#[derive(Debug, Clone)]
pub struct WorkerResolverConfig {
    /// Name for the worker thread.
    pub name: String,
    /// Stack size for the worker thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Capacity of the task queue.
    pub queue_capacity: usize,
}

impl Default for WorkerResolverConfig {
    fn default() -> Self {
        Self {
            name: "earthsci-resolver".to_string(),
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Builder for [`WorkerResolver`].
#[derive(Debug, Default)]
pub struct WorkerResolverBuilder {
    config: WorkerResolverConfig,
}

impl WorkerResolverBuilder {
    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size for the worker thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the task queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Build and start the resolver.
    pub fn build(self) -> WorkerResolver {
        WorkerResolver::with_config(self.config)
    }
}

struct Job {
    handle: ResolveHandle,
    request: LoadRequest,
    callback: ResolveCallback,
    token: CancellationToken,
}

enum Task {
    Resolve(Job),
    Shutdown,
}

#[derive(Default)]
struct Registry {
    by_content_type: HashMap<ContentType, ResolveFn>,
    by_scheme: HashMap<String, ResolveFn>,
}

impl Registry {
    fn find(&self, request: &LoadRequest) -> Option<ResolveFn> {
        request
            .content_type
            .as_ref()
            .and_then(|ct| self.by_content_type.get(ct))
            .or_else(|| self.by_scheme.get(request.uri.scheme()))
            .cloned()
    }
}

struct Shared {
    running: AtomicBool,
    next_handle: AtomicU64,
    registry: RwLock<Registry>,
    /// Tokens of submissions that have not reported yet.
    in_flight: Mutex<HashMap<ResolveHandle, CancellationToken>>,
}

impl Shared {
    fn finish(&self, job: Job, outcome: LoadOutcome) {
        self.in_flight.lock().remove(&job.handle);
        tracing::trace!(target: targets::WORKER, handle = %job.handle, "reporting outcome");
        (job.callback)(outcome);
    }

    fn run(&self, job: Job) {
        if let Some(outcome) = job.token.interruption() {
            tracing::debug!(target: targets::WORKER, handle = %job.handle, "skipping interrupted job");
            self.finish(job, outcome);
            return;
        }

        let resolve = self.registry.read().find(&job.request);
        let outcome = match resolve {
            Some(resolve) => match resolve(&job.request, &job.token) {
                Ok(resolution) => LoadOutcome::Completed {
                    uri: resolution.uri,
                    result: resolution.value,
                },
                Err(err) => LoadOutcome::Errored(err),
            },
            None => LoadOutcome::Errored(LoadError::NoHandler(job.request.uri.clone())),
        };
        // A request that arrived while running wins over the result.
        let outcome = job.token.interruption().unwrap_or(outcome);
        self.finish(job, outcome);
    }
}

/// A [`Resolver`] backed by a dedicated background thread.
///
/// Dropping the resolver requests shutdown without blocking; queued work
/// is still processed.
pub struct WorkerResolver {
    sender: Sender<Task>,
    thread: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl WorkerResolver {
    /// Create a resolver with default configuration.
    pub fn new() -> Self {
        Self::with_config(WorkerResolverConfig::default())
    }

    /// Start configuring a resolver.
    pub fn builder() -> WorkerResolverBuilder {
        WorkerResolverBuilder::default()
    }

    /// Create a resolver with custom configuration.
    ///
    /// If the thread cannot be spawned the resolver starts stopped and
    /// reports an error for every submission.
    pub fn with_config(config: WorkerResolverConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            next_handle: AtomicU64::new(1),
            registry: RwLock::new(Registry::default()),
            in_flight: Mutex::new(HashMap::new()),
        });

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread_shared = shared.clone();
        let thread = match builder.spawn(move || worker_loop(receiver, thread_shared)) {
            Ok(thread) => Some(thread),
            Err(err) => {
                tracing::error!(target: targets::WORKER, name = %config.name, %err, "failed to spawn resolver thread");
                shared.running.store(false, Ordering::Release);
                None
            }
        };

        Self {
            sender,
            thread: Mutex::new(thread),
            shared,
        }
    }

    /// Register a resolution function for a content type.
    pub fn register_content_type<F>(&self, content_type: impl Into<ContentType>, resolve: F)
    where
        F: Fn(&LoadRequest, &CancellationToken) -> Result<Resolution, LoadError> + Send + Sync + 'static,
    {
        self.shared
            .registry
            .write()
            .by_content_type
            .insert(content_type.into(), Arc::new(resolve));
    }

    /// Register a fallback resolution function for a URI scheme.
    pub fn register_scheme<F>(&self, scheme: impl Into<String>, resolve: F)
    where
        F: Fn(&LoadRequest, &CancellationToken) -> Result<Resolution, LoadError> + Send + Sync + 'static,
    {
        self.shared
            .registry
            .write()
            .by_scheme
            .insert(scheme.into(), Arc::new(resolve));
    }

    /// Whether the resolver still accepts work.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Number of submissions that have not reported yet.
    pub fn pending(&self) -> usize {
        self.shared.in_flight.lock().len()
    }

    /// Stop accepting work. Queued submissions are still processed.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        // Blocking send so the marker lands behind already-queued work.
        let _ = self.sender.send(Task::Shutdown);
    }

    /// Wait for the worker thread to exit. Call [`stop`](Self::stop) first.
    pub fn join(&self) -> bool {
        match self.thread.lock().take() {
            Some(thread) => thread.join().is_ok(),
            None => false,
        }
    }

    /// Stop and wait for the worker thread to exit.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }

    fn interrupt(&self, handle: ResolveHandle, interrupt: impl FnOnce(&CancellationToken)) -> bool {
        match self.shared.in_flight.lock().get(&handle) {
            Some(token) => {
                interrupt(token);
                true
            }
            None => false,
        }
    }
}

impl Default for WorkerResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for WorkerResolver {
    fn submit(&self, request: LoadRequest, callback: ResolveCallback) -> ResolveHandle {
        let handle = ResolveHandle::new(self.shared.next_handle.fetch_add(1, Ordering::Relaxed));
        if !self.is_running() {
            callback(LoadOutcome::Errored(LoadError::Resolver(
                "resolver has been stopped".to_string(),
            )));
            return handle;
        }

        let token = CancellationToken::new();
        self.shared.in_flight.lock().insert(handle, token.clone());
        let job = Job {
            handle,
            request,
            callback,
            token,
        };

        match self.sender.try_send(Task::Resolve(job)) {
            Ok(()) => {
                tracing::trace!(target: targets::WORKER, %handle, "queued");
            }
            Err(TrySendError::Full(Task::Resolve(job))) => {
                self.shared.finish(job, LoadOutcome::Errored(LoadError::Resolver(
                    "resolver queue is full".to_string(),
                )));
            }
            Err(TrySendError::Disconnected(Task::Resolve(job))) => {
                self.shared.finish(job, LoadOutcome::Errored(LoadError::Resolver(
                    "resolver has been stopped".to_string(),
                )));
            }
            Err(_) => {}
        }
        handle
    }

    fn cancel(&self, handle: ResolveHandle) -> bool {
        self.interrupt(handle, CancellationToken::cancel)
    }

    fn abort(&self, handle: ResolveHandle) -> bool {
        self.interrupt(handle, CancellationToken::abort)
    }
}

impl Drop for WorkerResolver {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        // Don't block in drop.
        let _ = self.sender.try_send(Task::Shutdown);
    }
}

fn worker_loop(receiver: Receiver<Task>, shared: Arc<Shared>) {
    tracing::debug!(target: targets::WORKER, "resolver thread started");
    while let Ok(task) = receiver.recv() {
        match task {
            Task::Resolve(job) => shared.run(job),
            Task::Shutdown => break,
        }
    }
    // Anything that raced past the shutdown marker still gets an outcome.
    while let Ok(task) = receiver.try_recv() {
        if let Task::Resolve(job) = task {
            shared.run(job);
        }
    }
    tracing::debug!(target: targets::WORKER, "resolver thread stopped");
}

static_assertions::assert_impl_all!(WorkerResolver: Send, Sync);
