//! Host Plugin
//!
//! [`install`] registers the binding with a host and returns its primitives: the
//! `get` and `post` descriptor helpers, and the `query` directive that mounts a
//! binding on an element.

use crate::binding::{
    EvalContext, Expression, ResultSink, SessionState, TriggerAdapter, DEFAULT_PROPERTY,
};
use crate::config::BindingConfig;
use crate::descriptor::{DescriptorBuilder, QueryDescriptor, QueryRequest};
use crate::dispose::Disposer;
use crate::error::BindError;
use crate::host::{watch, Effect, Element};
use crate::transport::Transport;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// What a host hands the plugin at installation
#[derive(Clone)]
pub struct HostApi {
    transport: Arc<dyn Transport>,
    default_property: String,
}

impl HostApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            default_property: DEFAULT_PROPERTY.to_string(),
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &BindingConfig) -> Self {
        Self::new(transport).default_property(config.default_property.clone())
    }

    pub fn default_property(mut self, name: impl Into<String>) -> Self {
        self.default_property = name.into();
        self
    }
}

/// Register the query binding with a host.
pub fn install(api: HostApi) -> QueryPlugin {
    info!(property = %api.default_property, "Query binding installed");
    QueryPlugin {
        transport: api.transport,
        default_property: api.default_property,
    }
}

/// Primitives exposed to host templates
#[derive(Clone)]
pub struct QueryPlugin {
    transport: Arc<dyn Transport>,
    default_property: String,
}

impl QueryPlugin {
    /// Names under which the primitives are registered.
    pub const PRIMITIVES: [&'static str; 3] = ["get", "post", "query"];

    pub fn get(&self, target: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::get(target)
    }

    pub fn post(&self, target: impl Into<String>, body: Option<Value>) -> DescriptorBuilder {
        DescriptorBuilder::post(target, body)
    }

    /// Build a descriptor against the plugin's transport.
    pub fn descriptor(&self, request: impl Into<QueryRequest>) -> Result<QueryDescriptor, BindError> {
        request.into().into_descriptor(&self.transport)
    }

    /// The `query` directive for `expression`.
    pub fn directive<F>(&self, expression: F) -> QueryDirective
    where
        F: Fn(&EvalContext<'_>) -> Result<QueryRequest, BindError> + Send + Sync + 'static,
    {
        QueryDirective {
            transport: Arc::clone(&self.transport),
            expression: Arc::new(expression),
            property: self.default_property.clone(),
        }
    }
}

/// A `query` directive waiting to be mounted
pub struct QueryDirective {
    transport: Arc<dyn Transport>,
    expression: Expression,
    property: String,
}

impl QueryDirective {
    /// Write results to `name` instead of the default property.
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.property = name.into();
        self
    }

    /// Mount on `element`. Fails synchronously when no engine is reachable from
    /// the element; expression errors after that go to the element's error channel.
    pub fn bind(self, element: &Element) -> Result<BoundQuery, BindError> {
        let engine = element.resolve_engine().ok_or_else(|| {
            BindError::EngineUnavailable(format!(
                "no query client is provided on '{}' or its ancestors",
                element.name()
            ))
        })?;

        let sink = ResultSink::new(element.state().clone(), self.property.clone());
        let adapter = Arc::new(TriggerAdapter::new(
            engine,
            self.transport,
            self.expression,
            sink,
            element,
        ));

        let effect = {
            let adapter = Arc::clone(&adapter);
            let errors = element.errors().clone();
            watch(move || {
                if let Err(err) = adapter.evaluate() {
                    errors.report(err);
                }
            })
        };
        element.on_cleanup(Disposer::from(effect.clone()));
        debug!(element = %element.name(), property = %self.property, "Query directive bound");

        Ok(BoundQuery { adapter, effect })
    }
}

/// A mounted `query` directive
pub struct BoundQuery {
    adapter: Arc<TriggerAdapter>,
    effect: Effect,
}

impl BoundQuery {
    pub fn session_state(&self) -> SessionState {
        self.adapter.session_state()
    }

    /// How many times the expression has been evaluated.
    pub fn evaluations(&self) -> usize {
        self.adapter.evaluations()
    }

    /// Detach the directive without destroying the element.
    pub fn remove(&self) {
        self.effect.dispose();
        self.adapter.teardown();
    }
}
