//! Fetch Transport
//!
//! The seam between query functions and the network. Query functions built by the
//! descriptor builder hold an `Arc<dyn Transport>` and only touch it when the engine
//! invokes them. [`HttpTransport`] is the reqwest-backed implementation.

use crate::error::{BindError, FetchError};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// HTTP method used by a query function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// How a response body becomes query data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Json,
    /// Body delivered as a JSON string value
    Text,
}

/// Per-call transport options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub format: ResponseFormat,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }
}

/// A fully described request, captured when the descriptor is built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportRequest {
    pub method: Method,
    pub target: String,
    pub body: Option<Value>,
    pub options: FetchOptions,
}

/// Executes requests on behalf of query functions
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<Value, FetchError>;
}

/// Transport client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL that relative targets are joined onto
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Headers sent with every request; per-call headers win
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            headers: BTreeMap::new(),
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(base) = &self.base_url {
            Url::parse(base).map_err(|e| format!("Invalid base_url '{}': {}", base, e))?;
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: Option<Url>,
    default_headers: BTreeMap<String, String>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, BindError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| BindError::ConfigError(format!("Invalid transport base_url: {}", e)))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BindError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            default_headers: config.headers.clone(),
        })
    }

    /// Absolute targets are used as-is; anything else is joined onto the base URL.
    pub fn resolve(&self, target: &str) -> Result<Url, FetchError> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(parse_err) => match &self.base_url {
                Some(base) => base
                    .join(target)
                    .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", target, e))),
                None => Err(FetchError::InvalidUrl(format!(
                    "{}: {} (no base_url configured)",
                    target, parse_err
                ))),
            },
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Value, FetchError> {
        let url = self.resolve(&request.target)?;
        debug!(method = request.method.as_str(), url = %url, "Executing query request");

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in self.default_headers.iter().chain(request.options.headers.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match request.options.format {
            ResponseFormat::Json => response
                .json::<Value>()
                .await
                .map_err(|e| FetchError::Decode(e.to_string())),
            ResponseFormat::Text => Ok(Value::String(response.text().await?)),
        }
    }
}
