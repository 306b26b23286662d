//! Elements, their local state, cleanup hooks and error channel.

use crate::dispose::Disposer;
use crate::engine::QueryEngine;
use crate::error::BindError;
use crate::result::QueryResult;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// A value held in an element's local state
#[derive(Debug, Clone, PartialEq)]
pub enum LocalValue {
    Json(Value),
    Query(QueryResult),
}

impl LocalValue {
    pub fn as_query(&self) -> Option<&QueryResult> {
        match self {
            LocalValue::Query(result) => Some(result),
            LocalValue::Json(_) => None,
        }
    }
}

type ChangeWatcher = Arc<dyn Fn(&str, &LocalValue) + Send + Sync>;

#[derive(Default)]
struct LocalStateInner {
    values: Mutex<BTreeMap<String, LocalValue>>,
    watchers: Mutex<Vec<(u64, ChangeWatcher)>>,
    next_watcher: AtomicU64,
    writes: AtomicUsize,
}

/// Named properties visible to an element's template
#[derive(Clone, Default)]
pub struct LocalState {
    inner: Arc<LocalStateInner>,
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` under `name` and notify change watchers.
    pub fn set(&self, name: &str, value: LocalValue) {
        self.inner
            .values
            .lock()
            .insert(name.to_string(), value.clone());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);

        let watchers: Vec<ChangeWatcher> = self
            .inner
            .watchers
            .lock()
            .iter()
            .map(|(_, w)| Arc::clone(w))
            .collect();
        for watcher in watchers {
            watcher(name, &value);
        }
    }

    pub fn get(&self, name: &str) -> Option<LocalValue> {
        self.inner.values.lock().get(name).cloned()
    }

    /// The query result stored under `name`, if that property holds one.
    pub fn query(&self, name: &str) -> Option<QueryResult> {
        self.get(name).and_then(|v| v.as_query().cloned())
    }

    /// Total number of writes since creation.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn on_change(&self, watcher: impl Fn(&str, &LocalValue) + Send + Sync + 'static) -> Disposer {
        let id = self.inner.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.inner.watchers.lock().push((id, Arc::new(watcher)));
        let weak = Arc::downgrade(&self.inner);
        Disposer::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.watchers.lock().retain(|(existing, _)| *existing != id);
            }
        })
    }
}

impl fmt::Debug for LocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalState")
            .field("values", &*self.inner.values.lock())
            .field("writes", &self.writes())
            .finish()
    }
}

/// Per-element error reporting
#[derive(Clone)]
pub struct ErrorChannel {
    element: Arc<str>,
    errors: Arc<Mutex<Vec<BindError>>>,
}

impl ErrorChannel {
    fn for_element(element: &str) -> Self {
        Self {
            element: Arc::from(element),
            errors: Arc::default(),
        }
    }

    pub fn report(&self, err: BindError) {
        error!(element = %self.element, error = %err, "Binding error");
        self.errors.lock().push(err);
    }

    /// Drain reported errors.
    pub fn take(&self) -> Vec<BindError> {
        std::mem::take(&mut *self.errors.lock())
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

struct ElementInner {
    name: String,
    parent: Option<Element>,
    state: LocalState,
    engine: Mutex<Option<Arc<dyn QueryEngine>>>,
    cleanups: Mutex<Vec<Disposer>>,
    destroyed: AtomicBool,
    errors: ErrorChannel,
}

/// A node in the host's element tree
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

/// Non-owning element reference
#[derive(Clone)]
pub struct WeakElement {
    inner: Weak<ElementInner>,
}

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.inner.upgrade().map(|inner| Element { inner })
    }
}

impl Element {
    pub fn root(name: impl Into<String>) -> Self {
        Self::with_parent(name.into(), None)
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        Self::with_parent(name.into(), Some(self.clone()))
    }

    fn with_parent(name: String, parent: Option<Element>) -> Self {
        let errors = ErrorChannel::for_element(&name);
        Self {
            inner: Arc::new(ElementInner {
                name,
                parent,
                state: LocalState::new(),
                engine: Mutex::new(None),
                cleanups: Mutex::new(Vec::new()),
                destroyed: AtomicBool::new(false),
                errors,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&Element> {
        self.inner.parent.as_ref()
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Make `engine` reachable from this element and its descendants.
    pub fn provide_engine(&self, engine: Arc<dyn QueryEngine>) {
        *self.inner.engine.lock() = Some(engine);
    }

    /// Nearest engine provided on this element or an ancestor.
    pub fn resolve_engine(&self) -> Option<Arc<dyn QueryEngine>> {
        let mut current = Some(self);
        while let Some(element) = current {
            if let Some(engine) = element.inner.engine.lock().as_ref() {
                return Some(Arc::clone(engine));
            }
            current = element.parent();
        }
        None
    }

    pub fn state(&self) -> &LocalState {
        &self.inner.state
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.inner.errors
    }

    /// Run `cleanup` when the element is destroyed, or now if it already was.
    pub fn on_cleanup(&self, cleanup: Disposer) {
        if self.is_destroyed() {
            cleanup.dispose();
            return;
        }
        self.inner.cleanups.lock().push(cleanup);
    }

    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.lock().len()
    }

    /// Run registered cleanups, most recent first. Later calls do nothing.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
        debug!(element = %self.inner.name, cleanups = cleanups.len(), "Destroying element");
        for cleanup in cleanups.into_iter().rev() {
            cleanup.dispose();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.inner.name)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
