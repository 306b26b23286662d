//! Query Engine Contract
//!
//! Bindings consume a query engine through [`QueryEngine`] and [`QueryObserver`].
//! The engine owns caching, deduplication, and fetch scheduling; a binding only
//! merges defaults, creates or reconfigures its observer, and subscribes to it.
//! [`QueryClient`] is the in-crate reference engine.

use crate::descriptor::QueryDescriptor;
use crate::key::QueryHash;
use crate::options::{NotifyMode, QueryOptions};
use crate::result::QueryResult;
use std::sync::Arc;

mod cache;
mod client;
pub mod notify;
mod observer;

pub use crate::dispose::Disposer as Unsubscribe;
pub use client::{ClientStats, QueryClient, QueuedSpawner, Spawner, TokioSpawner};
pub use observer::ClientObserver;

/// Callback receiving result transitions
pub type ResultListener = Arc<dyn Fn(QueryResult) + Send + Sync>;

/// A query-execution engine shared by every binding in a scope
pub trait QueryEngine: Send + Sync {
    /// Resolve a descriptor against the engine's process-wide defaults.
    fn merge_defaults(&self, descriptor: &QueryDescriptor) -> QueryOptions;

    /// Create an observer for `options`. Every call yields a distinct observer.
    fn observe(&self, options: QueryOptions) -> Arc<dyn QueryObserver>;

    /// Wrap a listener so notifications within one engine tick coalesce.
    fn batch_calls(&self, listener: ResultListener) -> ResultListener {
        notify::batch_calls(listener)
    }
}

/// Engine-side handle for one live subscription to a query's results
pub trait QueryObserver: Send + Sync {
    fn subscribe(&self, listener: ResultListener) -> Unsubscribe;

    /// Best-effort result available right now, before any fetch resolves.
    fn optimistic_result(&self, options: &QueryOptions) -> QueryResult;

    /// Recompute the current result, notifying listeners if it changed.
    fn reconcile_now(&self);

    /// Reconfigure the observer, redirecting it if the key changed.
    fn set_options(&self, options: QueryOptions, notify: NotifyMode);

    /// Scope change detection for later deliveries to the observer's
    /// `notify_on_change_props`. Returns `result` unchanged.
    fn track_result(&self, result: QueryResult) -> QueryResult;

    fn query_hash(&self) -> QueryHash;
}
