//! Binding session lifecycle.
//!
//! A session owns exactly one engine subscription from [`BindingSession::start`]
//! until [`BindingSession::unsubscribe`]. Results are forwarded to the sink
//! synchronously on the engine's notification path, and only while the session is
//! subscribed and the result belongs to the key the session currently targets.

use crate::descriptor::QueryDescriptor;
use crate::dispose::Disposer;
use crate::engine::{QueryEngine, QueryObserver, ResultListener, Unsubscribe};
use crate::error::BindError;
use crate::key::QueryHash;
use crate::options::{NotifyMode, OptimisticMode, QueryOptions};
use crate::result::QueryResult;
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Lifecycle state of a binding session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session has started yet. Only [`TriggerAdapter::session_state`] reports
    /// this; a [`BindingSession`] is subscribed from the moment it exists.
    ///
    /// [`TriggerAdapter::session_state`]: crate::binding::TriggerAdapter::session_state
    Unbound,
    Subscribed,
    Unsubscribed,
}

type SinkFn = Arc<dyn Fn(QueryResult) + Send + Sync>;

struct SessionInner {
    engine: Arc<dyn QueryEngine>,
    observer: Arc<dyn QueryObserver>,
    sink: SinkFn,
    current: Mutex<QueryHash>,
    subscribed: AtomicBool,
    unsubscribe: Mutex<Option<Unsubscribe>>,
    /// Held across the subscribed check and the sink call, and by `unsubscribe`,
    /// so no write lands once `unsubscribe` has returned. Re-entrant because a sink
    /// may tear its own binding down.
    delivery: ReentrantMutex<()>,
}

impl SessionInner {
    fn deliver(&self, result: QueryResult) {
        let _delivering = self.delivery.lock();
        if !self.subscribed.load(Ordering::SeqCst) {
            trace!(key = %result.key, "Session unsubscribed; dropping result");
            return;
        }
        let current = *self.current.lock();
        if result.query_hash != current {
            trace!(key = %result.key, "Discarding result for a superseded key");
            return;
        }
        (self.sink)(result);
    }

    fn deliver_tracked(&self, result: QueryResult) {
        let tracked = self.observer.track_result(result);
        self.deliver(tracked);
    }

    fn unsubscribe(&self) -> bool {
        let _delivering = self.delivery.lock();
        if !self.subscribed.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(unsubscribe) = self.unsubscribe.lock().take() {
            unsubscribe.dispose();
        }
        true
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// One live binding between a reactive expression and a query engine
#[derive(Clone)]
pub struct BindingSession {
    inner: Arc<SessionInner>,
}

impl BindingSession {
    /// Subscribe to `descriptor` and write the engine's optimistic result to
    /// `sink` before returning.
    pub fn start(
        engine: Option<Arc<dyn QueryEngine>>,
        descriptor: QueryDescriptor,
        sink: impl Fn(QueryResult) + Send + Sync + 'static,
    ) -> Result<Self, BindError> {
        let engine = engine.ok_or_else(|| {
            BindError::EngineUnavailable(
                "no query engine is reachable; provide a client before binding".to_string(),
            )
        })?;

        let options = Self::resolve(engine.as_ref(), &descriptor);
        let observer = engine.observe(options.clone());
        let inner = Arc::new(SessionInner {
            engine: Arc::clone(&engine),
            observer: Arc::clone(&observer),
            sink: Arc::new(sink),
            current: Mutex::new(options.fingerprint()),
            subscribed: AtomicBool::new(true),
            unsubscribe: Mutex::new(None),
            delivery: ReentrantMutex::new(()),
        });

        let weak = Arc::downgrade(&inner);
        let listener: ResultListener = Arc::new(move |result| {
            if let Some(inner) = weak.upgrade() {
                inner.deliver_tracked(result);
            }
        });
        let unsubscribe = observer.subscribe(engine.batch_calls(listener));
        *inner.unsubscribe.lock() = Some(unsubscribe);

        // Pick up anything that changed between observer creation and subscription.
        observer.reconcile_now();

        let optimistic = observer.optimistic_result(&options);
        inner.deliver_tracked(optimistic);

        debug!(key = %options.key, "Binding session started");
        Ok(Self { inner })
    }

    /// Retarget the live session. Results for the previous key stop reaching the
    /// sink immediately; the new key's first result arrives through the engine.
    pub fn update_options(&self, descriptor: QueryDescriptor) {
        if !self.is_subscribed() {
            debug!(key = %descriptor.key(), "Ignoring option update on an inactive session");
            return;
        }
        let options = Self::resolve(self.inner.engine.as_ref(), &descriptor);
        *self.inner.current.lock() = options.fingerprint();
        trace!(key = %options.key, "Session options updated");
        self.inner.observer.set_options(options, NotifyMode::Silent);
    }

    /// Release the engine subscription. Returns `false` if already released.
    pub fn unsubscribe(&self) -> bool {
        let released = self.inner.unsubscribe();
        if released {
            debug!("Binding session unsubscribed");
        }
        released
    }

    /// A disposer that unsubscribes this session, for host cleanup registration.
    pub fn teardown(&self) -> Disposer {
        let session = self.clone();
        Disposer::new(move || {
            session.unsubscribe();
        })
    }

    pub fn state(&self) -> SessionState {
        if self.is_subscribed() {
            SessionState::Subscribed
        } else {
            SessionState::Unsubscribed
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.load(Ordering::SeqCst)
    }

    /// Fingerprint of the key results are currently accepted for.
    pub fn current_hash(&self) -> QueryHash {
        *self.inner.current.lock()
    }

    fn resolve(engine: &dyn QueryEngine, descriptor: &QueryDescriptor) -> QueryOptions {
        engine
            .merge_defaults(descriptor)
            .with_optimistic(OptimisticMode::Optimistic)
    }
}

impl fmt::Debug for BindingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSession")
            .field("state", &self.state())
            .field("current", &self.current_hash())
            .finish()
    }
}
