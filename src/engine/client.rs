//! Reference query engine.
//!
//! `QueryClient` keeps one cache entry per key fingerprint, starts at most one fetch
//! per entry at a time, and hands query futures to a [`Spawner`]. It is cheap to
//! clone; clones share the same cache.

use crate::descriptor::{QueryDescriptor, QueryFn};
use crate::engine::cache::{QueryCache, QueryEntry};
use crate::engine::observer::ClientObserver;
use crate::engine::{notify, QueryEngine, QueryObserver};
use crate::key::QueryKey;
use crate::options::{QueryDefaults, QueryOptions};
use futures::future::{BoxFuture, FutureExt};
use futures::task::noop_waker;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, trace};

/// Runs engine tasks: query futures and deferred notifications
pub trait Spawner: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Spawner backed by a tokio runtime handle
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Spawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.handle.spawn(task);
    }
}

/// Spawner that holds tasks until the host drives them, e.g. once per frame
#[derive(Default)]
pub struct QueuedSpawner {
    tasks: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl QueuedSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Poll queued tasks until none makes progress. Returns how many completed.
    ///
    /// Tasks are polled outside the queue lock, so they may spawn further tasks.
    pub fn run_until_stalled(&self) -> usize {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut completed = 0;
        loop {
            let batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                break;
            }
            let polled = batch.len();
            let mut still_pending = Vec::new();
            for mut task in batch {
                match task.poll_unpin(&mut cx) {
                    Poll::Ready(()) => completed += 1,
                    Poll::Pending => still_pending.push(task),
                }
            }
            let progressed = still_pending.len() < polled;
            let mut tasks = self.tasks.lock();
            let spawned_meanwhile = !tasks.is_empty();
            still_pending.append(&mut tasks);
            *tasks = still_pending;
            if !progressed && !spawned_meanwhile {
                break;
            }
        }
        completed
    }
}

impl Spawner for QueuedSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.tasks.lock().push(task);
    }
}

/// Engine activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub observers_created: usize,
    pub subscriptions: usize,
    pub unsubscriptions: usize,
    pub fetches_started: usize,
    pub fetches_deduplicated: usize,
}

impl ClientStats {
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.saturating_sub(self.unsubscriptions)
    }
}

#[derive(Default)]
struct Counters {
    observers_created: AtomicUsize,
    subscriptions: AtomicUsize,
    unsubscriptions: AtomicUsize,
    fetches_started: AtomicUsize,
    fetches_deduplicated: AtomicUsize,
}

struct ClientShared {
    defaults: QueryDefaults,
    cache: QueryCache,
    spawner: Arc<dyn Spawner>,
    next_observer_id: AtomicU64,
    counters: Counters,
}

/// In-process query engine
#[derive(Clone)]
pub struct QueryClient {
    shared: Arc<ClientShared>,
}

impl QueryClient {
    pub fn new(defaults: QueryDefaults, spawner: Arc<dyn Spawner>) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                defaults,
                cache: QueryCache::default(),
                spawner,
                next_observer_id: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        }
    }

    pub fn with_tokio(defaults: QueryDefaults, handle: tokio::runtime::Handle) -> Self {
        Self::new(defaults, Arc::new(TokioSpawner::new(handle)))
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.shared.defaults
    }

    /// Run `f` as one engine tick: listener notifications coalesce until it returns.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        notify::batch(f)
    }

    pub fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        self.shared.cache.find(key).and_then(|entry| entry.snapshot().data)
    }

    /// Seed or replace cached data for `key`, notifying its observers.
    pub fn set_query_data(&self, key: &QueryKey, data: Value) {
        let entry = self.entry(key);
        entry.set_data(data);
        self.notify_observers(&entry);
    }

    /// Mark `key` stale and refetch it if observed, superseding any fetch in flight.
    pub fn invalidate(&self, key: &QueryKey) {
        let Some(entry) = self.shared.cache.find(key) else {
            return;
        };
        let last_fn = entry.invalidate();
        // Observers carry the latest options; fall back to the fn that last fetched.
        let query_fn = entry
            .observers()
            .last()
            .map(|observer| observer.query_fn())
            .or(last_fn);
        match query_fn {
            Some(query_fn) if entry.observer_count() > 0 => self.fetch(&entry, &query_fn, true),
            _ => debug!(key = %key, "Invalidated query has no observers; refetch deferred"),
        }
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.shared
            .cache
            .find(key)
            .map(|entry| entry.observer_count())
            .unwrap_or(0)
    }

    pub fn cached_queries(&self) -> usize {
        self.shared.cache.len()
    }

    pub fn stats(&self) -> ClientStats {
        let c = &self.shared.counters;
        ClientStats {
            observers_created: c.observers_created.load(Ordering::SeqCst),
            subscriptions: c.subscriptions.load(Ordering::SeqCst),
            unsubscriptions: c.unsubscriptions.load(Ordering::SeqCst),
            fetches_started: c.fetches_started.load(Ordering::SeqCst),
            fetches_deduplicated: c.fetches_deduplicated.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn entry(&self, key: &QueryKey) -> Arc<QueryEntry> {
        self.shared.cache.build(key)
    }

    pub(crate) fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.shared.spawner.spawn(task);
    }

    pub(crate) fn record_subscribe(&self) {
        self.shared.counters.subscriptions.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_unsubscribe(&self) {
        self.shared.counters.unsubscriptions.fetch_add(1, Ordering::SeqCst);
    }

    /// Start a fetch for `entry` unless one is already in flight.
    pub(crate) fn fetch(&self, entry: &Arc<QueryEntry>, query_fn: &QueryFn, cancel_in_flight: bool) {
        let counters = &self.shared.counters;
        let Some(generation) = entry.begin_fetch(query_fn, cancel_in_flight) else {
            counters.fetches_deduplicated.fetch_add(1, Ordering::SeqCst);
            trace!(key = %entry.key(), "Fetch already in flight; deduplicated");
            return;
        };
        counters.fetches_started.fetch_add(1, Ordering::SeqCst);
        debug!(key = %entry.key(), generation, "Fetch started");
        self.notify_observers(entry);

        let future = query_fn.call();
        let client = self.clone();
        let entry = Arc::clone(entry);
        self.spawn(
            async move {
                let outcome = future.await;
                client.settle(&entry, generation, outcome);
            }
            .boxed(),
        );
    }

    fn settle(
        &self,
        entry: &Arc<QueryEntry>,
        generation: u64,
        outcome: Result<Value, crate::error::FetchError>,
    ) {
        let succeeded = outcome.is_ok();
        if !entry.settle(generation, outcome) {
            debug!(key = %entry.key(), generation, "Dropping superseded fetch result");
            return;
        }
        debug!(key = %entry.key(), generation, succeeded, "Fetch settled");
        self.notify_observers(entry);
    }

    fn notify_observers(&self, entry: &Arc<QueryEntry>) {
        notify::batch(|| {
            for observer in entry.observers() {
                observer.on_entry_update();
            }
        });
    }
}

impl QueryEngine for QueryClient {
    fn merge_defaults(&self, descriptor: &QueryDescriptor) -> QueryOptions {
        QueryOptions::from_defaults(
            &self.shared.defaults,
            descriptor.key().clone(),
            descriptor.fetch().clone(),
        )
        .apply(descriptor.options())
    }

    fn observe(&self, options: QueryOptions) -> Arc<dyn QueryObserver> {
        let id = self.shared.next_observer_id.fetch_add(1, Ordering::SeqCst);
        self.shared
            .counters
            .observers_created
            .fetch_add(1, Ordering::SeqCst);
        trace!(observer = id, key = %options.key, "Observer created");
        Arc::new(ClientObserver::new(self.clone(), id, options))
    }
}
