//! Query Descriptor Builder
//!
//! Turns the shorthand a binding expression produces (a bare target, or a GET/POST
//! request with options) into a [`QueryDescriptor`]: a key plus a zero-argument query
//! function. Building never performs I/O; the transport is only touched when the
//! engine calls the query function.

use crate::error::{BindError, FetchError};
use crate::key::QueryKey;
use crate::options::QueryOptionsPatch;
use crate::transport::{FetchOptions, Method, Transport, TransportRequest};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type FetchFuture = BoxFuture<'static, Result<Value, FetchError>>;

/// Zero-argument asynchronous producer of query data
#[derive(Clone)]
pub struct QueryFn(Arc<dyn Fn() -> FetchFuture + Send + Sync>);

impl QueryFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> FetchFuture + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A query function that resolves immediately with `value`.
    pub fn from_value(value: Value) -> Self {
        Self::new(move || future::ready(Ok(value.clone())).boxed())
    }

    pub fn call(&self) -> FetchFuture {
        (self.0)()
    }
}

impl fmt::Debug for QueryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueryFn(..)")
    }
}

/// Normalized query descriptor. The key is never empty.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    key: QueryKey,
    fetch: QueryFn,
    options: QueryOptionsPatch,
}

impl QueryDescriptor {
    /// Describe a query directly from a key and a query function.
    pub fn new(key: QueryKey, fetch: QueryFn) -> Result<Self, BindError> {
        check_key(&key)?;
        Ok(Self {
            key,
            fetch,
            options: QueryOptionsPatch::default(),
        })
    }

    /// Overlay `options`; a key in the patch replaces the descriptor's key.
    pub fn with_options(mut self, options: QueryOptionsPatch) -> Result<Self, BindError> {
        if let Some(key) = &options.key {
            check_key(key)?;
            self.key = key.clone();
        }
        self.options = self.options.merged(&options);
        Ok(self)
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn fetch(&self) -> &QueryFn {
        &self.fetch
    }

    pub fn options(&self) -> &QueryOptionsPatch {
        &self.options
    }
}

fn check_key(key: &QueryKey) -> Result<(), BindError> {
    if key.is_empty() {
        return Err(BindError::InvalidDescriptor(
            "query key must contain at least one part".to_string(),
        ));
    }
    Ok(())
}

/// Builder for GET and POST query descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorBuilder {
    method: Method,
    target: String,
    body: Option<Value>,
    fetch_options: FetchOptions,
    query_options: QueryOptionsPatch,
}

impl DescriptorBuilder {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            target: target.into(),
            body: None,
            fetch_options: FetchOptions::default(),
            query_options: QueryOptionsPatch::default(),
        }
    }

    /// `body` of `None` sends no request body.
    pub fn post(target: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::Post,
            target: target.into(),
            body,
            fetch_options: FetchOptions::default(),
            query_options: QueryOptionsPatch::default(),
        }
    }

    pub fn fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    pub fn query_options(mut self, options: QueryOptionsPatch) -> Self {
        self.query_options = options;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn build(self, transport: &Arc<dyn Transport>) -> Result<QueryDescriptor, BindError> {
        let target = self.target.trim().to_string();
        if target.is_empty() {
            return Err(BindError::InvalidDescriptor(format!(
                "{} query requires a target",
                self.method.as_str()
            )));
        }

        let key = match &self.query_options.key {
            Some(key) => {
                check_key(key)?;
                key.clone()
            }
            None => QueryKey::for_target(&target),
        };

        let request = TransportRequest {
            method: self.method,
            target,
            body: self.body,
            options: self.fetch_options,
        };
        let transport = Arc::clone(transport);
        let fetch = QueryFn::new(move || {
            let transport = Arc::clone(&transport);
            let request = request.clone();
            async move { transport.execute(request).await }.boxed()
        });

        Ok(QueryDescriptor {
            key,
            fetch,
            options: self.query_options,
        })
    }
}

/// What a binding expression evaluates to
#[derive(Debug, Clone)]
pub enum QueryRequest {
    /// Bare target, normalized to a GET query
    Target(String),
    Builder(DescriptorBuilder),
    Descriptor(QueryDescriptor),
}

impl QueryRequest {
    pub fn into_descriptor(
        self,
        transport: &Arc<dyn Transport>,
    ) -> Result<QueryDescriptor, BindError> {
        match self {
            QueryRequest::Target(target) => DescriptorBuilder::get(target).build(transport),
            QueryRequest::Builder(builder) => builder.build(transport),
            QueryRequest::Descriptor(descriptor) => Ok(descriptor),
        }
    }
}

impl From<&str> for QueryRequest {
    fn from(target: &str) -> Self {
        QueryRequest::Target(target.to_string())
    }
}

impl From<String> for QueryRequest {
    fn from(target: String) -> Self {
        QueryRequest::Target(target)
    }
}

impl From<DescriptorBuilder> for QueryRequest {
    fn from(builder: DescriptorBuilder) -> Self {
        QueryRequest::Builder(builder)
    }
}

impl From<QueryDescriptor> for QueryRequest {
    fn from(descriptor: QueryDescriptor) -> Self {
        QueryRequest::Descriptor(descriptor)
    }
}
