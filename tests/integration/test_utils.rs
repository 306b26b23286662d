//! Shared test utilities for integration tests
//!
//! Provides a transport whose responses the test releases by hand, a harness that
//! wires a client, an element tree, and the plugin together on a manually driven
//! spawner, and isolation for tests that touch configuration environment variables.

use async_trait::async_trait;
use futures::channel::oneshot;
use parking_lot::Mutex as PlMutex;
use querybind::engine::{QueryClient, QueuedSpawner};
use querybind::host::{Element, LocalValue};
use querybind::options::QueryDefaults;
use querybind::plugin::{install, HostApi, QueryPlugin};
use querybind::result::QueryResult;
use querybind::transport::{Transport, TransportRequest};
use querybind::FetchError;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

type Reply = oneshot::Sender<Result<Value, FetchError>>;

/// Transport that parks every request until the test responds to it
#[derive(Default)]
pub struct GatedTransport {
    waiting: PlMutex<HashMap<String, VecDeque<Reply>>>,
    requests: PlMutex<Vec<TransportRequest>>,
}

impl GatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Complete the oldest parked request for `target`. Returns `false` if none is parked.
    pub fn respond(&self, target: &str, outcome: Result<Value, FetchError>) -> bool {
        let reply = self
            .waiting
            .lock()
            .get_mut(target)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(reply) => reply.send(outcome).is_ok(),
            None => false,
        }
    }

    pub fn parked(&self, target: &str) -> usize {
        self.waiting.lock().get(target).map(VecDeque::len).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, target: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.target == target)
            .count()
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Value, FetchError> {
        let (tx, rx) = oneshot::channel();
        self.waiting
            .lock()
            .entry(request.target.clone())
            .or_default()
            .push_back(tx);
        self.requests.lock().push(request);
        rx.await
            .unwrap_or_else(|_| Err(FetchError::Transport("request abandoned".to_string())))
    }
}

/// Client, element tree and plugin driven by a [`QueuedSpawner`]
pub struct Harness {
    pub spawner: Arc<QueuedSpawner>,
    pub client: QueryClient,
    pub transport: Arc<GatedTransport>,
    pub root: Element,
    pub plugin: QueryPlugin,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_defaults(QueryDefaults::default())
    }

    pub fn with_defaults(defaults: QueryDefaults) -> Self {
        let spawner = Arc::new(QueuedSpawner::new());
        let client = QueryClient::new(defaults, spawner.clone());
        let transport = GatedTransport::new();
        let root = Element::root("app");
        root.provide_engine(Arc::new(client.clone()));
        let plugin = install(HostApi::new(transport.clone()));
        Self {
            spawner,
            client,
            transport,
            root,
            plugin,
        }
    }

    /// Drive queued engine work until it stalls.
    pub fn run(&self) {
        self.spawner.run_until_stalled();
    }

    /// Run, release `target`'s oldest parked request, run again.
    pub fn resolve(&self, target: &str, outcome: Result<Value, FetchError>) {
        self.run();
        assert!(
            self.transport.respond(target, outcome),
            "no request parked for {}",
            target
        );
        self.run();
    }
}

/// Every query result written to `property` on `element`, in write order
pub fn record_writes(element: &Element, property: &str) -> Arc<PlMutex<Vec<QueryResult>>> {
    let writes = Arc::new(PlMutex::new(Vec::new()));
    let sink = Arc::clone(&writes);
    let property = property.to_string();
    // Outlives element destruction so late writes would still be seen.
    let _watcher = element.state().on_change(move |name, value| match value {
        LocalValue::Query(result) if name == property => sink.lock().push(result.clone()),
        _ => {}
    });
    writes
}

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ISOLATED_VARS: [&str; 4] = [
    "HOME",
    "XDG_CONFIG_HOME",
    "QUERYBIND_ENV",
    "QUERYBIND_CLIENT__STALE_TIME_MS",
];

/// Run `f` with XDG_CONFIG_HOME and HOME inside `test_dir` and no querybind
/// environment overrides. The previous environment is restored afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> = ISOLATED_VARS
        .iter()
        .map(|name| (*name, std::env::var(name).ok()))
        .collect();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());
    std::env::remove_var("QUERYBIND_ENV");
    std::env::remove_var("QUERYBIND_CLIENT__STALE_TIME_MS");

    let result = f();

    for (name, value) in saved {
        match value {
            Some(value) => std::env::set_var(name, value),
            None => std::env::remove_var(name),
        }
    }
    result
}
