//! Reactive trigger adapter.
//!
//! Each evaluation of the user's expression normalizes whatever it returned into a
//! descriptor. The first evaluation starts the binding session and hands its
//! teardown to the element's cleanup hook; later evaluations retarget that same
//! session instead of creating a new one.

use crate::binding::session::{BindingSession, SessionState};
use crate::binding::sink::ResultSink;
use crate::descriptor::{DescriptorBuilder, QueryRequest};
use crate::engine::QueryEngine;
use crate::error::BindError;
use crate::host::{Element, WeakElement};
use crate::transport::Transport;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a binding expression sees while it is evaluated
pub struct EvalContext<'a> {
    element: &'a Element,
}

impl<'a> EvalContext<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &Element {
        self.element
    }

    pub fn get(&self, target: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::get(target)
    }

    pub fn post(&self, target: impl Into<String>, body: Option<Value>) -> DescriptorBuilder {
        DescriptorBuilder::post(target, body)
    }
}

/// User expression producing the query to bind
pub type Expression =
    Arc<dyn Fn(&EvalContext<'_>) -> Result<QueryRequest, BindError> + Send + Sync>;

/// Connects one binding expression on one element to a session
pub struct TriggerAdapter {
    engine: Arc<dyn QueryEngine>,
    transport: Arc<dyn Transport>,
    expression: Expression,
    sink: ResultSink,
    element: WeakElement,
    session: Mutex<Option<BindingSession>>,
    evaluations: AtomicUsize,
}

impl TriggerAdapter {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        transport: Arc<dyn Transport>,
        expression: Expression,
        sink: ResultSink,
        element: &Element,
    ) -> Self {
        Self {
            engine,
            transport,
            expression,
            sink,
            element: element.downgrade(),
            session: Mutex::new(None),
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Evaluate the expression and start or retarget the session.
    pub fn evaluate(&self) -> Result<(), BindError> {
        let Some(element) = self.element.upgrade() else {
            warn!("Binding evaluated after its element was dropped");
            return Ok(());
        };
        self.evaluations.fetch_add(1, Ordering::SeqCst);

        let request = (self.expression)(&EvalContext::new(&element))?;
        let descriptor = request.into_descriptor(&self.transport)?;

        // The lock is not held while the session starts: starting writes the first
        // result into local state, and watchers of that state may query this adapter.
        let existing = self.session.lock().clone();
        if let Some(session) = existing {
            session.update_options(descriptor);
            return Ok(());
        }

        let sink = self.sink.clone();
        let session = BindingSession::start(
            Some(Arc::clone(&self.engine)),
            descriptor.clone(),
            move |result| sink.write(result),
        )?;

        let mut slot = self.session.lock();
        if let Some(winner) = slot.clone() {
            drop(slot);
            debug!(element = %element.name(), "Concurrent mount lost; keeping existing session");
            session.unsubscribe();
            winner.update_options(descriptor);
            return Ok(());
        }
        *slot = Some(session.clone());
        drop(slot);

        element.on_cleanup(session.teardown());
        debug!(
            element = %element.name(),
            property = %self.sink.property(),
            "Binding mounted"
        );
        Ok(())
    }

    pub fn session_state(&self) -> SessionState {
        self.session
            .lock()
            .as_ref()
            .map(BindingSession::state)
            .unwrap_or(SessionState::Unbound)
    }

    pub fn session(&self) -> Option<BindingSession> {
        self.session.lock().clone()
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    /// Unsubscribe the session, if one was started.
    pub fn teardown(&self) {
        if let Some(session) = self.session.lock().as_ref() {
            session.unsubscribe();
        }
    }
}
