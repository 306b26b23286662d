//! Reference observer.
//!
//! An observer is attached to exactly one cache entry at a time, and only while it
//! has listeners. Redirecting to a new key detaches from the old entry first, so
//! updates for the old key stop reaching this observer's listeners.

use crate::descriptor::QueryFn;
use crate::engine::cache::QueryEntry;
use crate::engine::client::QueryClient;
use crate::engine::{notify, QueryObserver, ResultListener, Unsubscribe};
use crate::key::QueryHash;
use crate::options::{NotifyMode, OptimisticMode, QueryOptions, TrackedProp};
use crate::result::QueryResult;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

struct ObserverState {
    options: QueryOptions,
    entry: Arc<QueryEntry>,
    current: QueryResult,
    listeners: Vec<(u64, ResultListener)>,
    next_listener_id: u64,
    tracked: Option<Vec<TrackedProp>>,
    /// Deliver `current` on the next update even if nothing tracked changed.
    announce: bool,
}

pub(crate) struct ObserverInner {
    id: u64,
    client: QueryClient,
    state: Mutex<ObserverState>,
    weak_self: Weak<ObserverInner>,
}

/// Observer handle created by [`QueryClient`]
pub struct ClientObserver {
    inner: Arc<ObserverInner>,
}

impl ClientObserver {
    pub(crate) fn new(client: QueryClient, id: u64, options: QueryOptions) -> Self {
        let entry = client.entry(&options.key);
        let will_fetch = options.optimistic == OptimisticMode::Optimistic
            && entry.snapshot().should_fetch(&options);
        let current = entry.result(will_fetch);

        let inner = Arc::new_cyclic(|weak_self| ObserverInner {
            id,
            client,
            state: Mutex::new(ObserverState {
                options,
                entry,
                current,
                listeners: Vec::new(),
                next_listener_id: 1,
                tracked: None,
                announce: false,
            }),
            weak_self: weak_self.clone(),
        });
        Self { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn current_result(&self) -> QueryResult {
        self.inner.state.lock().current.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }
}

impl ObserverInner {
    /// Recompute from the attached entry and notify listeners if tracked fields
    /// changed or a delivery was announced.
    pub(crate) fn on_entry_update(&self) {
        let (listeners, result) = {
            let mut state = self.state.lock();
            let result = state.entry.result(false);
            if !state.announce && !result.differs(&state.current, state.tracked.as_deref()) {
                trace!(observer = self.id, "Result unchanged; skipping notification");
                return;
            }
            state.announce = false;
            state.current = result.clone();
            let listeners: Vec<ResultListener> =
                state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (listeners, result)
        };
        for listener in listeners {
            listener(result.clone());
        }
    }

    pub(crate) fn query_fn(&self) -> QueryFn {
        self.state.lock().options.query_fn.clone()
    }

    fn remove_listener(&self, listener_id: u64) {
        let detach = {
            let mut state = self.state.lock();
            let before = state.listeners.len();
            state.listeners.retain(|(id, _)| *id != listener_id);
            if state.listeners.len() == before {
                return;
            }
            state.listeners.is_empty().then(|| Arc::clone(&state.entry))
        };
        self.client.record_unsubscribe();
        if let Some(entry) = detach {
            entry.remove_observer(self.id);
            debug!(observer = self.id, key = %entry.key(), "Observer detached");
        }
    }
}

impl QueryObserver for ClientObserver {
    fn subscribe(&self, listener: ResultListener) -> Unsubscribe {
        let inner = &self.inner;
        let (listener_id, first, entry, options) = {
            let mut state = inner.state.lock();
            let listener_id = state.next_listener_id;
            state.next_listener_id += 1;
            state.listeners.push((listener_id, listener));
            (
                listener_id,
                state.listeners.len() == 1,
                Arc::clone(&state.entry),
                state.options.clone(),
            )
        };
        inner.client.record_subscribe();

        if first {
            entry.add_observer(inner.id, inner.weak_self.clone());
            debug!(observer = inner.id, key = %entry.key(), "Observer attached");
            if entry.snapshot().should_fetch(&options) {
                inner.client.fetch(&entry, &options.query_fn, false);
            }
        }

        let weak = inner.weak_self.clone();
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove_listener(listener_id);
            }
        })
    }

    fn optimistic_result(&self, options: &QueryOptions) -> QueryResult {
        let entry = self.inner.client.entry(&options.key);
        let mut state = self.inner.state.lock();
        let same_entry = entry.hash() == state.entry.hash();
        // Once attached, the mount-time fetch decision is already reflected in the entry.
        let attached = same_entry && !state.listeners.is_empty();
        let will_fetch = options.optimistic == OptimisticMode::Optimistic
            && !attached
            && entry.snapshot().should_fetch(options);
        let result = entry.result(will_fetch);
        if same_entry {
            state.current = result.clone();
        }
        result
    }

    fn reconcile_now(&self) {
        notify::batch(|| self.inner.on_entry_update());
    }

    fn set_options(&self, options: QueryOptions, notify_mode: NotifyMode) {
        let inner = &self.inner;
        let new_entry = inner.client.entry(&options.key);
        let (switched, old_entry, attached, was_enabled) = {
            let mut state = inner.state.lock();
            let switched = state.entry.hash() != new_entry.hash();
            let was_enabled = state.options.enabled;
            let old_entry = std::mem::replace(&mut state.entry, Arc::clone(&new_entry));
            state.options = options.clone();
            (switched, old_entry, !state.listeners.is_empty(), was_enabled)
        };

        if switched && attached {
            old_entry.remove_observer(inner.id);
            new_entry.add_observer(inner.id, inner.weak_self.clone());
            debug!(
                observer = inner.id,
                from = %old_entry.key(),
                to = %new_entry.key(),
                "Observer redirected"
            );
        }

        let will_fetch = attached
            && (switched || !was_enabled)
            && new_entry.snapshot().should_fetch(&options);
        let optimistic = options.optimistic == OptimisticMode::Optimistic;

        match notify_mode {
            NotifyMode::Listeners => {
                notify::batch(|| {
                    inner.on_entry_update();
                    if will_fetch {
                        inner.client.fetch(&new_entry, &options.query_fn, false);
                    }
                });
            }
            NotifyMode::Silent if will_fetch => {
                // Quiet now; the new key's fetching state is delivered on the next tick
                // unless the fetch settles first.
                inner.state.lock().current = new_entry.result(optimistic);
                inner.client.fetch(&new_entry, &options.query_fn, false);
                inner.state.lock().announce = true;
                let weak = inner.weak_self.clone();
                inner.client.spawn(
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            notify::batch(|| inner.on_entry_update());
                        }
                    }
                    .boxed(),
                );
            }
            NotifyMode::Silent if switched && attached => {
                // Nothing to fetch for the new key; deliver its cached state on the next tick.
                let weak = inner.weak_self.clone();
                inner.client.spawn(
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            notify::batch(|| inner.on_entry_update());
                        }
                    }
                    .boxed(),
                );
            }
            NotifyMode::Silent => {
                let mut state = inner.state.lock();
                state.current = state.entry.result(false);
            }
        }
    }

    fn track_result(&self, result: QueryResult) -> QueryResult {
        let mut state = self.inner.state.lock();
        state.tracked = state.options.notify_on_change_props.clone();
        result
    }

    fn query_hash(&self) -> QueryHash {
        self.inner.state.lock().entry.hash()
    }
}

impl Drop for ClientObserver {
    fn drop(&mut self) {
        let entry = {
            let mut state = self.inner.state.lock();
            if state.listeners.is_empty() {
                return;
            }
            state.listeners.clear();
            Arc::clone(&state.entry)
        };
        entry.remove_observer(self.inner.id);
    }
}
