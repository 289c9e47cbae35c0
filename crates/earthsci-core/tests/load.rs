//! Integration tests for the layer load state machine.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use earthsci_core::worker::{CancellationToken, Resolution};
use earthsci_core::{
    AutoPrompt, DispatchValue, Dispatcher, HandlerInfo, LayerContent, LayerLoader, LayerTree,
    ListenerScope, LoadError, LoadOutcome, LoadRequest, LoadState, NodeId, NodeProperty,
    NotificationCategory, NotificationLog, Prompt, PromptAnswer, ResolveCallback, ResolveHandle,
    Resolved, Resolver, Severity, WorkerResolver,
};
use parking_lot::Mutex;
use url::Url;

#[derive(Debug)]
struct Imagery;

impl LayerContent for Imagery {
    fn name(&self) -> &str {
        "imagery"
    }
}

/// A catalog document: recognized, but not a layer.
#[derive(Debug)]
struct CatalogDocument;

impl DispatchValue for CatalogDocument {
    fn kind_name(&self) -> &'static str {
        "Catalog"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Resolver whose outcomes are delivered by hand.
#[derive(Default)]
struct ManualResolver {
    next: Mutex<u64>,
    callbacks: Mutex<HashMap<ResolveHandle, ResolveCallback>>,
    requests: Mutex<Vec<LoadRequest>>,
    aborted: Mutex<Vec<ResolveHandle>>,
}

impl ManualResolver {
    fn deliver(&self, handle: ResolveHandle, outcome: LoadOutcome) {
        let callback = self.callbacks.lock().get(&handle).cloned().expect("known handle");
        callback(outcome);
    }
}

impl Resolver for ManualResolver {
    fn submit(&self, request: LoadRequest, callback: ResolveCallback) -> ResolveHandle {
        let mut next = self.next.lock();
        *next += 1;
        let handle = ResolveHandle::new(*next);
        self.requests.lock().push(request);
        self.callbacks.lock().insert(handle, callback);
        handle
    }

    fn cancel(&self, handle: ResolveHandle) -> bool {
        self.callbacks.lock().contains_key(&handle)
    }

    fn abort(&self, handle: ResolveHandle) -> bool {
        self.aborted.lock().push(handle);
        true
    }
}

/// Dispatcher that knows catalog documents and records what it was given.
#[derive(Default)]
struct CatalogDispatcher {
    dispatched: Mutex<Vec<(String, Url)>>,
}

impl Dispatcher for CatalogDispatcher {
    fn find_handler(&self, value: &Resolved) -> Option<HandlerInfo> {
        match value {
            Resolved::Other(v) if v.as_any().is::<CatalogDocument>() => {
                Some(HandlerInfo::new("Catalog browser"))
            }
            _ => None,
        }
    }

    fn dispatch(&self, value: Resolved, uri: &Url) {
        self.dispatched.lock().push((value.kind().to_string(), uri.clone()));
    }
}

struct Fixture {
    tree: LayerTree,
    node: NodeId,
    resolver: Arc<ManualResolver>,
    dispatcher: Arc<CatalogDispatcher>,
    prompt: Arc<AutoPrompt>,
    log: Arc<NotificationLog>,
    loader: LayerLoader,
}

fn fixture(with_dispatcher: bool) -> Fixture {
    let tree = LayerTree::new();
    let folder = tree.create_folder("folder", None);
    let uri = Url::parse("https://example.com/u2.xml").unwrap();
    let node = tree.create_layer("N", Some(uri));
    tree.set_content_type(node, Some("au.gov.ga.earthsci.layer".into())).unwrap();
    tree.add_child(tree.root(), folder).unwrap();
    tree.add_child(folder, node).unwrap();

    let resolver = Arc::new(ManualResolver::default());
    let dispatcher = Arc::new(CatalogDispatcher::default());
    let prompt = Arc::new(AutoPrompt::accepting());
    let log = Arc::new(NotificationLog::new());
    let mut builder = LayerLoader::builder(tree.clone(), resolver.clone())
        .prompt(prompt.clone())
        .notifications(log.clone());
    if with_dispatcher {
        builder = builder.dispatcher(dispatcher.clone());
    }
    Fixture {
        tree,
        node,
        resolver,
        dispatcher,
        prompt,
        log,
        loader: builder.build(),
    }
}

#[test]
fn start_submits_uri_and_content_type() {
    let f = fixture(true);
    let handle = f.loader.start(f.node).unwrap();
    assert_eq!(handle.state(), LoadState::Loading);

    let requests = f.resolver.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri.as_str(), "https://example.com/u2.xml");
    assert_eq!(
        requests[0].content_type.as_ref().map(|c| c.id()),
        Some("au.gov.ga.earthsci.layer")
    );
}

#[test]
fn other_kind_with_handler_detaches_and_prompts_once() {
    let f = fixture(true);
    let handle = f.loader.start(f.node).unwrap();
    let uri = handle.request().uri.clone();

    f.resolver.deliver(
        handle.resolve_handle().unwrap(),
        LoadOutcome::completed(uri.clone(), Some(Resolved::Other(Arc::new(CatalogDocument)))),
    );

    assert_eq!(f.tree.parent(f.node).unwrap(), None);
    assert_eq!(f.prompt.asked(), 1);
    assert_eq!(*f.dispatcher.dispatched.lock(), vec![("Catalog".to_string(), uri)]);
    assert_eq!(handle.state(), LoadState::Completed);
    assert!(f.log.is_empty());
}

#[test]
fn declined_redispatch_does_not_dispatch() {
    let tree = LayerTree::new();
    let node = tree.create_layer("N", Some(Url::parse("file:///n.xml").unwrap()));
    tree.add_child(tree.root(), node).unwrap();
    let resolver = Arc::new(ManualResolver::default());
    let dispatcher = Arc::new(CatalogDispatcher::default());
    let prompt = Arc::new(AutoPrompt::declining());
    let loader = LayerLoader::builder(tree.clone(), resolver.clone())
        .dispatcher(dispatcher.clone())
        .prompt(prompt.clone())
        .build();

    let handle = loader.start(node).unwrap();
    resolver.deliver(
        handle.resolve_handle().unwrap(),
        LoadOutcome::completed(handle.request().uri.clone(), Some(Resolved::Other(Arc::new(CatalogDocument)))),
    );
    assert_eq!(prompt.asked(), 1);
    assert!(dispatcher.dispatched.lock().is_empty());
    assert_eq!(tree.parent(node).unwrap(), None);
}

#[test]
fn other_kind_without_handler_is_type_mismatch() {
    let f = fixture(false);
    let handle = f.loader.start(f.node).unwrap();
    f.resolver.deliver(
        handle.resolve_handle().unwrap(),
        LoadOutcome::completed(handle.request().uri.clone(), Some(Resolved::Other(Arc::new(CatalogDocument)))),
    );

    assert_eq!(handle.state(), LoadState::Errored);
    let status = f.tree.status(f.node).unwrap();
    assert_eq!(status.message(), Some("Expected Layer, got Catalog"));
    assert_eq!(f.prompt.asked(), 0);
    assert_eq!(f.log.len(), 1);
}

#[test]
fn errored_sets_status_and_reports_once() {
    let f = fixture(true);
    let handle = f.loader.start(f.node).unwrap();
    let cause = LoadError::Resolver("connection refused".into());

    f.resolver.deliver(handle.resolve_handle().unwrap(), LoadOutcome::Errored(cause.clone()));

    let status = f.tree.status(f.node).unwrap();
    assert_eq!(status.cause(), Some(&cause));
    assert_eq!(status.message(), Some("connection refused"));
    assert!(f.tree.parent(f.node).unwrap().is_some());

    let reports = f.log.notifications();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].severity, Severity::Error);
    assert_eq!(reports[0].category, NotificationCategory::FileIo);
    assert!(reports[0].message.contains("https://example.com/u2.xml"));
    assert_eq!(handle.state(), LoadState::Errored);
}

#[test]
fn duplicate_deliveries_are_ignored() {
    let f = fixture(true);
    let handle = f.loader.start(f.node).unwrap();
    let resolve = handle.resolve_handle().unwrap();
    let status_events = Arc::new(Mutex::new(0));
    let status_clone = status_events.clone();
    f.tree.connect_property(ListenerScope::Node(f.node), NodeProperty::Status, move |_| {
        *status_clone.lock() += 1;
    });

    f.resolver.deliver(resolve, LoadOutcome::Errored(LoadError::EmptyResult));
    f.resolver.deliver(resolve, LoadOutcome::Canceled);
    f.resolver.deliver(resolve, LoadOutcome::Aborted);

    assert_eq!(handle.state(), LoadState::Errored);
    assert_eq!(*status_events.lock(), 1);
    assert_eq!(f.log.len(), 1);
    assert!(f.tree.parent(f.node).unwrap().is_some());
}

#[test]
fn canceled_keeps_node_attached() {
    let f = fixture(true);
    let handle = f.loader.start(f.node).unwrap();
    assert!(f.loader.cancel(&handle));
    assert!(f.tree.status(f.node).unwrap().is_ok());

    f.resolver.deliver(handle.resolve_handle().unwrap(), LoadOutcome::Canceled);
    assert_eq!(handle.state(), LoadState::Canceled);
    assert_eq!(f.tree.status(f.node).unwrap().cause(), Some(&LoadError::Canceled));
    assert!(f.tree.parent(f.node).unwrap().is_some());
    assert!(f.log.is_empty());
}

#[test]
fn aborted_detaches_silently() {
    let f = fixture(true);
    let handle = f.loader.start(f.node).unwrap();
    assert!(f.loader.abort(&handle));
    assert_eq!(*f.resolver.aborted.lock(), vec![handle.resolve_handle().unwrap()]);

    f.resolver.deliver(handle.resolve_handle().unwrap(), LoadOutcome::Aborted);
    assert_eq!(handle.state(), LoadState::Aborted);
    assert_eq!(f.tree.parent(f.node).unwrap(), None);
    assert!(f.tree.status(f.node).unwrap().is_ok());
    assert!(f.log.is_empty());
    assert!(!f.loader.abort(&handle));
}

#[test]
fn worker_resolver_end_to_end() {
    let tree = LayerTree::new();
    let node = tree.create_layer("remote", Some(Url::parse("https://example.com/remote.xml").unwrap()));
    tree.add_child(tree.root(), node).unwrap();

    let resolver = Arc::new(WorkerResolver::builder().name("e2e-resolver").build());
    resolver.register_scheme("https", |request: &LoadRequest, _: &CancellationToken| {
        let mut normalized = request.uri.clone();
        normalized.set_query(Some("service=WMS"));
        Ok(Resolution::new(normalized, Some(Resolved::Layer(Arc::new(Imagery)))))
    });

    let (tx, rx) = crossbeam_channel::bounded(1);
    tree.connect_property(ListenerScope::Node(node), NodeProperty::Uri, move |change| {
        let _ = tx.try_send(change.new.clone());
    });

    let loader = LayerLoader::new(tree.clone(), resolver.clone());
    let handle = loader.start(node).unwrap();
    rx.recv_timeout(Duration::from_secs(5)).expect("load completed");

    // The state is recorded once the outcome has been fully applied.
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(handle.state(), LoadState::Completed);
    assert_eq!(
        tree.uri(node).unwrap().map(|u| u.to_string()),
        Some("https://example.com/remote.xml?service=WMS".to_string())
    );
    assert!(tree.layer(node).unwrap().is_some());
    resolver.stop_and_join();
}

/// Prompt that records which thread asked it.
#[derive(Default)]
struct ThreadRecordingPrompt {
    threads: Mutex<Vec<Option<String>>>,
}

impl Prompt for ThreadRecordingPrompt {
    fn confirm(&self, _title: &str, _message: &str) -> bool {
        let name = std::thread::current().name().map(str::to_string);
        self.threads.lock().push(name);
        true
    }

    fn ask_yes_no(&self, title: &str, message: &str) -> PromptAnswer {
        PromptAnswer::once(self.confirm(title, message))
    }
}

#[test]
fn redispatch_prompt_runs_on_resolver_thread() {
    let tree = LayerTree::new();
    let node = tree.create_layer("catalog", Some(Url::parse("https://example.com/catalog.xml").unwrap()));
    tree.add_child(tree.root(), node).unwrap();

    let resolver = Arc::new(WorkerResolver::builder().name("catalog-resolver").build());
    resolver.register_scheme("https", |request: &LoadRequest, _: &CancellationToken| {
        Ok(Resolution::new(request.uri.clone(), Some(Resolved::Other(Arc::new(CatalogDocument)))))
    });
    let dispatcher = Arc::new(CatalogDispatcher::default());
    let prompt = Arc::new(ThreadRecordingPrompt::default());
    let loader = LayerLoader::builder(tree.clone(), resolver.clone())
        .dispatcher(dispatcher.clone())
        .prompt(prompt.clone())
        .build();

    let handle = loader.start(node).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(handle.state(), LoadState::Completed);
    assert_eq!(*prompt.threads.lock(), vec![Some("catalog-resolver".to_string())]);
    assert_ne!(std::thread::current().name(), Some("catalog-resolver"));
    assert_eq!(dispatcher.dispatched.lock().len(), 1);
    assert_eq!(tree.parent(node).unwrap(), None);
    resolver.stop_and_join();
}
