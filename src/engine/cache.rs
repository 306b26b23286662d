//! Per-key cache entries.

use crate::descriptor::QueryFn;
use crate::engine::observer::ObserverInner;
use crate::error::FetchError;
use crate::key::{QueryHash, QueryKey};
use crate::options::QueryOptions;
use crate::result::{FetchStatus, QueryResult, QueryStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Point-in-time copy of an entry's query state
#[derive(Debug, Clone)]
pub(crate) struct EntrySnapshot {
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub data: Option<Value>,
    pub error: Option<FetchError>,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error_updated_at: Option<DateTime<Utc>>,
    pub invalidated: bool,
}

impl Default for EntrySnapshot {
    fn default() -> Self {
        Self {
            status: QueryStatus::Pending,
            fetch_status: FetchStatus::Idle,
            data: None,
            error: None,
            data_updated_at: None,
            error_updated_at: None,
            invalidated: false,
        }
    }
}

impl EntrySnapshot {
    pub fn is_stale(&self, options: &QueryOptions) -> bool {
        if self.invalidated {
            return true;
        }
        match self.data_updated_at {
            None => true,
            Some(updated_at) => match chrono::Duration::from_std(options.stale_time) {
                Ok(stale_time) => Utc::now() - updated_at >= stale_time,
                Err(_) => false,
            },
        }
    }

    /// Whether mounting an observer with `options` should start a fetch.
    pub fn should_fetch(&self, options: &QueryOptions) -> bool {
        options.enabled && self.fetch_status == FetchStatus::Idle && self.is_stale(options)
    }
}

struct EntryState {
    snapshot: EntrySnapshot,
    generation: u64,
    query_fn: Option<QueryFn>,
    observers: Vec<(u64, Weak<ObserverInner>)>,
}

/// Cached state for one query key
pub(crate) struct QueryEntry {
    key: QueryKey,
    hash: QueryHash,
    state: Mutex<EntryState>,
}

impl QueryEntry {
    fn new(key: QueryKey) -> Self {
        let hash = key.fingerprint();
        Self {
            key,
            hash,
            state: Mutex::new(EntryState {
                snapshot: EntrySnapshot::default(),
                generation: 0,
                query_fn: None,
                observers: Vec::new(),
            }),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn hash(&self) -> QueryHash {
        self.hash
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        self.state.lock().snapshot.clone()
    }

    pub fn result(&self, will_fetch: bool) -> QueryResult {
        let snapshot = self.snapshot();
        let mut result = QueryResult::pending(self.key.clone());
        result.status = snapshot.status;
        result.data = snapshot.data;
        result.error = snapshot.error;
        result.data_updated_at = snapshot.data_updated_at;
        result.error_updated_at = snapshot.error_updated_at;
        let fetch_status = if will_fetch {
            FetchStatus::Fetching
        } else {
            snapshot.fetch_status
        };
        result.with_fetch_status(fetch_status)
    }

    pub fn add_observer(&self, id: u64, observer: Weak<ObserverInner>) {
        let mut state = self.state.lock();
        if !state.observers.iter().any(|(existing, _)| *existing == id) {
            state.observers.push((id, observer));
        }
    }

    pub fn remove_observer(&self, id: u64) {
        self.state.lock().observers.retain(|(existing, _)| *existing != id);
    }

    /// Live observers; dropped observers are pruned.
    pub fn observers(&self) -> Vec<Arc<ObserverInner>> {
        let mut state = self.state.lock();
        state.observers.retain(|(_, weak)| weak.strong_count() > 0);
        state
            .observers
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    pub fn observer_count(&self) -> usize {
        self.observers().len()
    }

    /// Mark a fetch as started. Returns `None` when one is already in flight,
    /// unless `cancel_in_flight` supersedes it.
    pub fn begin_fetch(&self, query_fn: &QueryFn, cancel_in_flight: bool) -> Option<u64> {
        let mut state = self.state.lock();
        if state.snapshot.fetch_status == FetchStatus::Fetching && !cancel_in_flight {
            return None;
        }
        state.generation += 1;
        state.query_fn = Some(query_fn.clone());
        state.snapshot.fetch_status = FetchStatus::Fetching;
        Some(state.generation)
    }

    /// Apply a fetch outcome. Returns `false` if `generation` was superseded.
    pub fn settle(&self, generation: u64, outcome: Result<Value, FetchError>) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        let now = Utc::now();
        let snapshot = &mut state.snapshot;
        snapshot.fetch_status = FetchStatus::Idle;
        match outcome {
            Ok(data) => {
                snapshot.status = QueryStatus::Success;
                snapshot.data = Some(data);
                snapshot.error = None;
                snapshot.data_updated_at = Some(now);
                snapshot.invalidated = false;
            }
            Err(error) => {
                // Previously fetched data stays available next to the error.
                snapshot.status = QueryStatus::Error;
                snapshot.error = Some(error);
                snapshot.error_updated_at = Some(now);
            }
        }
        true
    }

    pub fn set_data(&self, data: Value) {
        let mut state = self.state.lock();
        let snapshot = &mut state.snapshot;
        snapshot.status = QueryStatus::Success;
        snapshot.data = Some(data);
        snapshot.error = None;
        snapshot.data_updated_at = Some(Utc::now());
        snapshot.invalidated = false;
    }

    /// Mark stale and return the last query function, if any.
    pub fn invalidate(&self) -> Option<QueryFn> {
        let mut state = self.state.lock();
        state.snapshot.invalidated = true;
        state.query_fn.clone()
    }
}

/// Entry store keyed by query fingerprint
#[derive(Default)]
pub(crate) struct QueryCache {
    entries: Mutex<HashMap<QueryHash, Arc<QueryEntry>>>,
}

impl QueryCache {
    /// Get or create the entry for `key`.
    pub fn build(&self, key: &QueryKey) -> Arc<QueryEntry> {
        let hash = key.fingerprint();
        let mut entries = self.entries.lock();
        Arc::clone(
            entries
                .entry(hash)
                .or_insert_with(|| Arc::new(QueryEntry::new(key.clone()))),
        )
    }

    pub fn find(&self, key: &QueryKey) -> Option<Arc<QueryEntry>> {
        self.entries.lock().get(&key.fingerprint()).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
